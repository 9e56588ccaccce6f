//! Hamming-similar sample search over the partition tables.
//!
//! Every dataset has four partition tables, one per hash mask. A table row
//! files a sample under the partition its signature hashes to for that mask.
//! A similarity search reads the four partitions the target signature falls
//! in, unions the candidates, and keeps those within the Hamming bound.
//!
//! Engines only answer single-partition queries; union, ordering, truncation
//! and shaping happen in [`find_similar`] so every backend returns the same
//! shape of result.

mod memory;
mod sql;
mod sqlite;

pub use memory::MemoryEngine;
pub use sql::render_union_sql;
pub use sqlite::SqliteEngine;

use std::collections::HashSet;
use std::io;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sigsearch_core::{Point, NUM_MASKS};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query engine unavailable: {0}")]
    Transient(String),

    #[error("malformed query result: {0}")]
    Malformed(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The engine process could not be started (missing binary, argv too large)
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl QueryError {
    /// Only engine-reported unavailability is worth retrying. Spawn and local
    /// IO failures come back the same on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Transient(_))
    }
}

/// One single-partition lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionQuery {
    /// Fully qualified table, `{dataset}{suffix}.hamming{i}`
    pub table: String,
    pub partition_id: u32,
    pub target_signature: i64,
    /// Exclusive upper bound on Hamming distance
    pub max_hamming: u32,
    pub limit: usize,
}

/// A candidate row with its distance to the target signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRow {
    pub signature: i64,
    pub hamming: u32,
    pub point: Point,
}

/// Source of partition-table rows.
///
/// Implementations return rows of `query.table` with `part == partition_id`
/// and Hamming distance strictly below `max_hamming`, ordered by ascending
/// distance and truncated to `limit`.
pub trait SimilarityEngine: Send + Sync {
    fn query_partition(&self, query: &PartitionQuery) -> Result<Vec<SignatureRow>, QueryError>;
}

pub fn table_name(dataset: &str, suffix: &str, index: usize) -> String {
    format!("{dataset}{suffix}.hamming{index}")
}

/// Inputs for one similarity search
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRequest<'a> {
    pub dataset: &'a str,
    pub dataset_suffix: &'a str,
    /// Signature of the resolved sample
    pub signature: i64,
    /// Query location, the reference for the spatial filter
    pub point: Point,
    pub partitions: [u32; NUM_MASKS],
    pub max_hamming: u32,
    pub limit: usize,
    pub max_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub point: Point,
    /// Hamming distance to the query signature
    pub dist: u32,
    /// `1 - dist / max_hamming`
    pub score: f64,
}

/// Union the four partition lookups into a ranked, filtered match list.
///
/// Rows are deduplicated on `(signature, point)`, ordered by Hamming distance
/// with ties broken by `rng`, and cut to `limit` before the spatial filter.
/// The filter keeps only matches farther than `max_distance` from the
/// query point, so the result can hold fewer than `limit` entries.
pub fn find_similar<R>(
    engine: &dyn SimilarityEngine,
    request: &SimilarityRequest<'_>,
    rng: &mut R,
) -> Result<Vec<SimilarMatch>, QueryError>
where
    R: Rng + ?Sized,
{
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (index, partition_id) in request.partitions.iter().enumerate() {
        let query = PartitionQuery {
            table: table_name(request.dataset, request.dataset_suffix, index),
            partition_id: *partition_id,
            target_signature: request.signature,
            max_hamming: request.max_hamming,
            limit: request.limit,
        };
        let found = engine.query_partition(&query)?;
        tracing::debug!(table = %query.table, partition = query.partition_id, rows = found.len(), "partition queried");
        for row in found {
            if seen.insert((row.signature, row.point)) {
                rows.push(row);
            }
        }
    }

    // shuffle then stable sort: equal distances come out in random order
    rows.shuffle(rng);
    rows.sort_by_key(|row| row.hamming);
    rows.truncate(request.limit);

    let max_hamming = f64::from(request.max_hamming);
    let matches = rows
        .into_iter()
        .filter(|row| request.point.distance(&row.point) > request.max_distance)
        .map(|row| SimilarMatch {
            point: row.point,
            dist: row.hamming,
            score: 1.0 - f64::from(row.hamming) / max_hamming,
        })
        .collect();
    Ok(matches)
}
