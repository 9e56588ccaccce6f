use std::collections::HashMap;

use parking_lot::RwLock;
use sigsearch_core::{hamming_distance, partitions, DatasetMetadata, Point};

use super::{table_name, PartitionQuery, QueryError, SignatureRow, SimilarityEngine};

#[derive(Debug, Clone, Copy)]
struct TableRow {
    part: u32,
    signature: i64,
    point: Point,
}

/// Partition tables held in memory, keyed by fully qualified table name.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<HashMap<String, Vec<TableRow>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table; querying a table that was never created fails.
    pub fn create_table(&self, table: impl Into<String>) {
        self.tables.write().entry(table.into()).or_default();
    }

    pub fn insert_row(&self, table: &str, part: u32, signature: i64, point: Point) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(TableRow {
                part,
                signature,
                point,
            });
    }

    /// File a sample into all four partition tables of `dataset`.
    pub fn index_sample(
        &self,
        dataset: &str,
        suffix: &str,
        meta: &DatasetMetadata,
        point: Point,
        signature: i64,
    ) {
        for (index, part) in partitions(meta, signature).into_iter().enumerate() {
            self.insert_row(&table_name(dataset, suffix, index), part, signature, point);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }
}

impl SimilarityEngine for MemoryEngine {
    fn query_partition(&self, query: &PartitionQuery) -> Result<Vec<SignatureRow>, QueryError> {
        let tables = self.tables.read();
        let rows = tables
            .get(&query.table)
            .ok_or_else(|| QueryError::UnknownTable(query.table.clone()))?;

        let mut out: Vec<SignatureRow> = rows
            .iter()
            .filter(|row| row.part == query.partition_id)
            .map(|row| SignatureRow {
                signature: row.signature,
                hamming: hamming_distance(row.signature, query.target_signature),
                point: row.point,
            })
            .filter(|row| row.hamming < query.max_hamming)
            .collect();
        out.sort_by_key(|row| row.hamming);
        out.truncate(query.limit);
        Ok(out)
    }
}
