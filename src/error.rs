//! Lookup error taxonomy
//!
//! Storage and query adapters have their own error types
//! ([`StoreError`](crate::store::StoreError),
//! [`QueryError`](crate::query::QueryError)). At the lookup boundary a
//! missing or unreadable metadata blob becomes `MetadataNotFound`, and a
//! missing, unreadable or sample-free block becomes `PointNotFound`; callers
//! cannot and need not tell those causes apart.

use sigsearch_core::Point;
use thiserror::Error;

use crate::config::ConfigError;
use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("dataset not found: {dataset} ({reason})")]
    MetadataNotFound { dataset: String, reason: String },

    #[error("point not found: no sample within {max_distance} of {point} in {dataset}")]
    PointNotFound {
        dataset: String,
        point: Point,
        max_distance: f64,
    },

    #[error("similarity query failed: {0}")]
    TransientQuery(#[from] QueryError),

    #[error("invalid lookup options: {0}")]
    InvalidOptions(#[from] ConfigError),
}

impl LookupError {
    /// True for negative results (`MetadataNotFound`, `PointNotFound`) as
    /// opposed to faults talking to the query engine.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LookupError::MetadataNotFound { .. } | LookupError::PointNotFound { .. }
        )
    }

    /// True when retrying the whole lookup later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::TransientQuery(err) => err.is_transient(),
            LookupError::MetadataNotFound { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let missing = LookupError::PointNotFound {
            dataset: "mb20".into(),
            point: Point::new(1, 2, 3),
            max_distance: 100.0,
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_transient());
        assert_eq!(
            missing.to_string(),
            "point not found: no sample within 100 of (1, 2, 3) in mb20"
        );

        let meta = LookupError::MetadataNotFound {
            dataset: "mb20".into(),
            reason: "object not found: mb20/info.json".into(),
        };
        assert!(meta.is_not_found());
        assert!(meta.is_transient());
        assert!(meta.to_string().starts_with("dataset not found: mb20"));

        let query = LookupError::from(QueryError::Transient("timeout".into()));
        assert!(!query.is_not_found());
        assert!(query.is_transient());

        let spawn = LookupError::from(QueryError::Spawn {
            program: "sqlite3".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert!(!spawn.is_not_found());
        assert!(!spawn.is_transient());
    }
}
