//! Object-store access for dataset metadata and blocks.
//!
//! Keys are relative to a bucket:
//!
//! ```text
//! {dataset}/info.json                  dataset metadata
//! {dataset}/blocks/{xb}_{yb}_{zb}      packed sample records
//! ```

mod fs;
mod http;
mod memory;

pub use fs::FsBlockStore;
pub use http::HttpBlockStore;
pub use memory::MemoryBlockStore;

use std::io;
use std::sync::Arc;

use sigsearch_core::BlockCoord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("transient store failure for {key}: {reason}")]
    Transient { key: String, reason: String },

    #[error("unexpected status {status} for {key}")]
    Status { key: String, status: u16 },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

/// Read access to a bucket of immutable objects.
pub trait BlockStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Full object contents. A missing object is `StoreError::NotFound`.
    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_bytes(key)
    }
}

pub fn metadata_key(dataset: &str) -> String {
    format!("{dataset}/info.json")
}

pub fn block_key(dataset: &str, coord: &BlockCoord) -> String {
    format!("{dataset}/blocks/{coord}")
}

/// Reject keys that could escape the bucket root on path-based stores.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigsearch_core::Point;

    #[test]
    fn test_key_layout() {
        assert_eq!(metadata_key("mb20"), "mb20/info.json");
        let coord = Point::new(18416, 16369, 26467).block_coord(1000);
        assert_eq!(block_key("mb20", &coord), "mb20/blocks/18_16_26");
        let coord = Point::new(-1, -1000, -1001).block_coord(1000);
        assert_eq!(block_key("mb20", &coord), "mb20/blocks/-1_-1_-2");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("mb20/blocks/1_2_3").is_ok());
        assert!(validate_key("mb20/blocks/-1_-2_-3").is_ok());
        for key in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a/./b", "a\\b", "a/"] {
            assert!(
                matches!(validate_key(key), Err(StoreError::InvalidKey(_))),
                "{key:?}"
            );
        }
    }
}
