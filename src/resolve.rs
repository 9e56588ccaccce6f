//! Point → stored sample resolution.
//!
//! A point is resolved by fetching the single block that contains it and
//! taking the nearest record within the radius. Neighbouring blocks are never
//! consulted, so a sample just across a block boundary is not found even
//! when it is within the radius.

use serde::Serialize;
use sigsearch_core::{Block, DatasetMetadata, Point};

use crate::error::LookupError;
use crate::store::{block_key, metadata_key, BlockStore};

/// A stored sample matched to a query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedSample {
    pub point: Point,
    pub signature: i64,
    /// Distance from the query point
    pub distance: f64,
}

/// Fetch and parse `{dataset}/info.json`.
///
/// Every failure, including a transport error or a malformed document,
/// surfaces as `MetadataNotFound`.
pub fn load_metadata(store: &dyn BlockStore, dataset: &str) -> Result<DatasetMetadata, LookupError> {
    let key = metadata_key(dataset);
    let not_found = |reason: String| LookupError::MetadataNotFound {
        dataset: dataset.to_string(),
        reason,
    };

    let bytes = store.get_bytes(&key).map_err(|e| not_found(e.to_string()))?;
    DatasetMetadata::from_json_slice(&bytes).map_err(|e| not_found(format!("{key}: {e}")))
}

/// Nearest stored sample to `point` within `max_distance` (inclusive).
pub fn resolve_point(
    store: &dyn BlockStore,
    dataset: &str,
    meta: &DatasetMetadata,
    point: Point,
    max_distance: f64,
) -> Result<ResolvedSample, LookupError> {
    let not_found = || LookupError::PointNotFound {
        dataset: dataset.to_string(),
        point,
        max_distance,
    };

    let key = block_key(dataset, &meta.block_coord(&point));
    let bytes = match store.get_bytes(&key) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(%key, error = %err, "block unavailable");
            return Err(not_found());
        }
    };

    let block = Block::new(&bytes);
    if block.trailing_bytes() != 0 {
        tracing::warn!(
            %key,
            trailing = block.trailing_bytes(),
            "corrupt block: length is not a whole number of records"
        );
    }

    let nearest = block.nearest(&point, max_distance).ok_or_else(not_found)?;
    tracing::debug!(%key, records = block.len(), index = nearest.index, distance = nearest.distance, "resolved point");
    Ok(ResolvedSample {
        point: nearest.record.point,
        signature: nearest.record.signature,
        distance: nearest.distance,
    })
}
