//! Partition tables in per-dataset SQLite files, read through the `sqlite3`
//! command-line shell.
//!
//! Table `{dataset}{suffix}.hamming{i}` lives in
//! `{root}/{dataset}{suffix}.sqlite3` as table `hamming{i}` with the column
//! order of the partition CSVs written at dataset build time:
//!
//! ```text
//! part INTEGER, signature INTEGER, x INTEGER, y INTEGER, z INTEGER
//! ```
//!
//! SQLite has no popcount, so the partition slice is fetched by `part` and
//! the Hamming bound, ordering and limit are applied here.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use sigsearch_core::{hamming_distance, partitions, DatasetMetadata, Point, NUM_MASKS};

use super::{PartitionQuery, QueryError, SignatureRow, SimilarityEngine};

#[derive(Debug, Clone)]
pub struct SqliteEngine {
    root: PathBuf,
    binary: String,
}

impl SqliteEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            binary: "sqlite3".to_string(),
        }
    }

    /// Use a specific `sqlite3` executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn database_path(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{namespace}.sqlite3"))
    }

    /// Create the database and its four partition tables if missing.
    pub fn create_dataset(&self, dataset: &str, suffix: &str) -> Result<PathBuf, QueryError> {
        let namespace = format!("{dataset}{suffix}");
        check_namespace(&namespace)?;
        std::fs::create_dir_all(&self.root)?;
        let db = self.database_path(&namespace);

        let mut sql = String::new();
        for index in 0..NUM_MASKS {
            sql.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS hamming{index}(part INTEGER NOT NULL, signature INTEGER NOT NULL, x INTEGER NOT NULL, y INTEGER NOT NULL, z INTEGER NOT NULL);\n\
                 CREATE INDEX IF NOT EXISTS hamming{index}_part ON hamming{index}(part);\n"
            ));
        }
        self.exec(&db, &sql)?;
        Ok(db)
    }

    /// File samples into all four tables, like the dataset build does.
    pub fn index_samples(
        &self,
        dataset: &str,
        suffix: &str,
        meta: &DatasetMetadata,
        samples: &[(Point, i64)],
    ) -> Result<(), QueryError> {
        let db = self.create_dataset(dataset, suffix)?;
        let mut sql = String::from("BEGIN;\n");
        for (point, signature) in samples {
            for (index, part) in partitions(meta, *signature).into_iter().enumerate() {
                sql.push_str(&format!(
                    "INSERT INTO hamming{index}(part, signature, x, y, z) VALUES ({part}, {signature}, {}, {}, {});\n",
                    point.x, point.y, point.z
                ));
            }
        }
        sql.push_str("COMMIT;\n");
        self.exec(&db, &sql)
    }

    /// Bulk-load a headerless `part,signature,x,y,z` CSV into table `hamming{index}`.
    pub fn import_partition_csv(
        &self,
        dataset: &str,
        suffix: &str,
        index: usize,
        csv: &Path,
    ) -> Result<(), QueryError> {
        if index >= NUM_MASKS {
            return Err(QueryError::UnknownTable(format!("{dataset}{suffix}.hamming{index}")));
        }
        let csv = csv
            .to_str()
            .ok_or_else(|| QueryError::Malformed(format!("non UTF-8 path: {}", csv.display())))?;
        if csv.contains('"') || csv.contains('\n') {
            return Err(QueryError::Malformed(format!("unsupported CSV path: {csv}")));
        }
        let db = self.create_dataset(dataset, suffix)?;
        self.exec(&db, &format!(".import --csv \"{csv}\" hamming{index}"))
    }

    fn exec(&self, db: &Path, sql: &str) -> Result<(), QueryError> {
        let output = self.run(db, &[], sql)?;
        if !output.status.success() {
            return Err(QueryError::Transient(format!(
                "sqlite exec failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn query_json(&self, db: &Path, sql: &str) -> Result<Vec<Value>, QueryError> {
        let output = self.run(db, &["-json"], sql)?;

        if !output.status.success() {
            return Err(QueryError::Transient(format!(
                "sqlite query failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            QueryError::Malformed(format!(
                "parsing sqlite json output: {e}: {}",
                String::from_utf8_lossy(&output.stdout)
            ))
        })
    }

    /// Run the shell against `db` with `script` on stdin.
    ///
    /// Scripts go through stdin rather than argv so batch size is not bound
    /// by the kernel's per-argument limit. stdin is fed from its own thread
    /// while stdout and stderr drain, so neither pipe can fill up and stall.
    fn run(&self, db: &Path, flags: &[&str], script: &str) -> Result<Output, QueryError> {
        let mut child = Command::new(&self.binary)
            .args(flags)
            .arg(db)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| QueryError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(script.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (written, output)
        });
        let output = output?;

        // A shell that exits early closes its stdin; its status and stderr
        // say more than the broken pipe does.
        if let Err(err) = written {
            if output.status.success() {
                return Err(QueryError::Io(err));
            }
        }
        Ok(output)
    }
}

impl SimilarityEngine for SqliteEngine {
    fn query_partition(&self, query: &PartitionQuery) -> Result<Vec<SignatureRow>, QueryError> {
        let (namespace, table) = split_table(&query.table)?;
        let db = self.database_path(namespace);
        if !db.is_file() {
            return Err(QueryError::UnknownTable(query.table.clone()));
        }

        let sql = format!(
            "SELECT signature, x, y, z FROM {table} WHERE part = {};",
            query.partition_id
        );
        let rows = self.query_json(&db, &sql)?;

        let mut out = Vec::new();
        for row in &rows {
            let signature = int_field(row, "signature")?;
            let hamming = hamming_distance(signature, query.target_signature);
            if hamming >= query.max_hamming {
                continue;
            }
            out.push(SignatureRow {
                signature,
                hamming,
                point: Point::new(
                    coord_field(row, "x")?,
                    coord_field(row, "y")?,
                    coord_field(row, "z")?,
                ),
            });
        }
        out.sort_by_key(|row| row.hamming);
        out.truncate(query.limit);
        Ok(out)
    }
}

/// `"mb20_imgsearch.hamming0"` → `("mb20_imgsearch", "hamming0")`
fn split_table(qualified: &str) -> Result<(&str, &str), QueryError> {
    let (namespace, table) = qualified
        .rsplit_once('.')
        .ok_or_else(|| QueryError::UnknownTable(qualified.to_string()))?;
    check_namespace(namespace)?;
    let is_ident = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_ident {
        return Err(QueryError::UnknownTable(qualified.to_string()));
    }
    Ok((namespace, table))
}

fn check_namespace(namespace: &str) -> Result<(), QueryError> {
    let ok = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !namespace.starts_with('.');
    if !ok {
        return Err(QueryError::UnknownTable(namespace.to_string()));
    }
    Ok(())
}

fn int_field(row: &Value, name: &str) -> Result<i64, QueryError> {
    row.get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| QueryError::Malformed(format!("row missing integer '{name}': {row}")))
}

fn coord_field(row: &Value, name: &str) -> Result<i32, QueryError> {
    let value = int_field(row, name)?;
    i32::try_from(value)
        .map_err(|_| QueryError::Malformed(format!("coordinate '{name}' out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_table() {
        assert_eq!(
            split_table("mb20_imgsearch.hamming2").unwrap(),
            ("mb20_imgsearch", "hamming2")
        );
        assert_eq!(split_table("a.b_c.hamming0").unwrap(), ("a.b_c", "hamming0"));
        for bad in ["nodot", "../x.hamming0", "a.ham;ming", "a.", ".hamming0", "a b.hamming0"] {
            assert!(split_table(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_row_fields() {
        let row = json!({"signature": -3, "x": 1, "y": 2, "z": 3});
        assert_eq!(int_field(&row, "signature").unwrap(), -3);
        assert_eq!(coord_field(&row, "z").unwrap(), 3);
        assert!(int_field(&row, "part").is_err());
        assert!(coord_field(&json!({"x": 1i64 << 40}), "x").is_err());
    }

    fn partition_query() -> PartitionQuery {
        PartitionQuery {
            table: "mb20_imgsearch.hamming0".into(),
            partition_id: 1,
            target_signature: 0,
            max_hamming: 8,
            limit: 10,
        }
    }

    #[test]
    fn test_missing_binary_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mb20_imgsearch.sqlite3"), b"").unwrap();
        let engine =
            SqliteEngine::new(dir.path()).with_binary("/nonexistent/bin/sqlite3-missing");

        let err = engine.query_partition(&partition_query()).unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }), "{err:?}");
        assert!(!err.is_transient());

        let err = engine.create_dataset("mb20", "_imgsearch").unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }), "{err:?}");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_missing_database_is_unknown_table() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::new(dir.path());
        let err = engine.query_partition(&partition_query()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownTable(_)));
    }
}
