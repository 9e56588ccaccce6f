//! Lookup service: point resolution and similarity search over one bucket.

use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use sigsearch_core::{partitions, DatasetMetadata, Point, NUM_MASKS};

use crate::cache::MetadataCache;
use crate::config::{LookupConfig, LookupOptions};
use crate::error::LookupError;
use crate::metrics::{LookupMetrics, MetricsSnapshot};
use crate::query::{find_similar, render_union_sql, SimilarMatch, SimilarityEngine, SimilarityRequest};
use crate::resolve::{resolve_point, ResolvedSample};
use crate::store::{metadata_key, BlockStore, StoreError};

/// Outcome of a similarity search: the resolved sample and its matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarResult {
    pub point: Point,
    pub signature: i64,
    pub matches: Vec<SimilarMatch>,
}

pub struct SignatureService {
    store: Arc<dyn BlockStore>,
    engine: Arc<dyn SimilarityEngine>,
    cache: Arc<MetadataCache>,
    config: LookupConfig,
    metrics: LookupMetrics,
}

impl SignatureService {
    pub fn new(
        store: Arc<dyn BlockStore>,
        engine: Arc<dyn SimilarityEngine>,
        config: LookupConfig,
    ) -> Self {
        Self::with_cache(store, engine, config, Arc::new(MetadataCache::new()))
    }

    /// Share a metadata cache between services (e.g. one per bucket replica).
    pub fn with_cache(
        store: Arc<dyn BlockStore>,
        engine: Arc<dyn SimilarityEngine>,
        config: LookupConfig,
        cache: Arc<MetadataCache>,
    ) -> Self {
        Self {
            store,
            engine,
            cache,
            config,
            metrics: LookupMetrics::default(),
        }
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.cache.fetch_count(), self.cache.hit_count())
    }

    /// Whether `{dataset}/info.json` exists. Does not populate the cache.
    pub fn has_dataset(&self, dataset: &str) -> Result<bool, StoreError> {
        self.store.exists(&metadata_key(dataset))
    }

    pub fn metadata(&self, dataset: &str) -> Result<Arc<DatasetMetadata>, LookupError> {
        let result = self.cache.get_metadata(self.store.as_ref(), dataset);
        if result.is_err() {
            LookupMetrics::incr(&self.metrics.metadata_not_found_total);
        }
        result
    }

    /// Nearest stored sample to `point` within the effective `max_distance`.
    pub fn fetch_signature(
        &self,
        dataset: &str,
        point: Point,
        options: &LookupOptions,
    ) -> Result<ResolvedSample, LookupError> {
        let resolved = self.config.resolve(options)?;
        let meta = self.metadata(dataset)?;
        self.resolve_with(dataset, &meta, point, resolved.max_distance)
    }

    /// Resolve many points of one dataset in parallel.
    ///
    /// Options and metadata are checked once for the batch; a failure there
    /// fails the whole call. Per-point outcomes are returned in input order.
    pub fn fetch_signatures(
        &self,
        dataset: &str,
        points: &[Point],
        options: &LookupOptions,
    ) -> Result<Vec<Result<ResolvedSample, LookupError>>, LookupError> {
        let resolved = self.config.resolve(options)?;
        let meta = self.metadata(dataset)?;

        Ok(points
            .par_iter()
            .map(|point| self.resolve_with(dataset, &meta, *point, resolved.max_distance))
            .collect())
    }

    pub fn partitions_for(&self, dataset: &str, signature: i64) -> Result<[u32; NUM_MASKS], LookupError> {
        let meta = self.metadata(dataset)?;
        Ok(partitions(&meta, signature))
    }

    pub fn find_similar_signatures(
        &self,
        dataset: &str,
        point: Point,
        options: &LookupOptions,
    ) -> Result<SimilarResult, LookupError> {
        self.find_similar_with_rng(dataset, point, options, &mut rand::thread_rng())
    }

    /// [`find_similar_signatures`](Self::find_similar_signatures) with a
    /// caller-supplied tie-break source.
    pub fn find_similar_with_rng<R>(
        &self,
        dataset: &str,
        point: Point,
        options: &LookupOptions,
        rng: &mut R,
    ) -> Result<SimilarResult, LookupError>
    where
        R: Rng + ?Sized,
    {
        let resolved = self.config.resolve(options)?;
        let meta = self.metadata(dataset)?;
        let sample = self.resolve_with(dataset, &meta, point, resolved.max_distance)?;

        LookupMetrics::incr(&self.metrics.similar_queries_total);
        let parts = partitions(&meta, sample.signature);
        tracing::debug!(dataset, signature = sample.signature, partitions = ?parts, "similarity search");

        let request = SimilarityRequest {
            dataset,
            dataset_suffix: &self.config.dataset_suffix,
            signature: sample.signature,
            point,
            partitions: parts,
            max_hamming: resolved.max_hamming,
            limit: resolved.limit,
            max_distance: resolved.max_distance,
        };
        let matches = find_similar(self.engine.as_ref(), &request, rng).map_err(|err| {
            LookupMetrics::incr(&self.metrics.query_failures_total);
            tracing::warn!(dataset, error = %err, "similarity query failed");
            LookupError::from(err)
        })?;

        Ok(SimilarResult {
            point: sample.point,
            signature: sample.signature,
            matches,
        })
    }

    /// SQL a warehouse engine would run for this search.
    pub fn explain_similar(
        &self,
        dataset: &str,
        point: Point,
        options: &LookupOptions,
    ) -> Result<String, LookupError> {
        let resolved = self.config.resolve(options)?;
        let meta = self.metadata(dataset)?;
        let sample = self.resolve_with(dataset, &meta, point, resolved.max_distance)?;
        Ok(render_union_sql(
            dataset,
            &self.config.dataset_suffix,
            sample.signature,
            &partitions(&meta, sample.signature),
            resolved.max_hamming,
            resolved.limit,
        ))
    }

    fn resolve_with(
        &self,
        dataset: &str,
        meta: &DatasetMetadata,
        point: Point,
        max_distance: f64,
    ) -> Result<ResolvedSample, LookupError> {
        LookupMetrics::incr(&self.metrics.lookups_total);
        let result = resolve_point(self.store.as_ref(), dataset, meta, point, max_distance);
        if result.is_err() {
            LookupMetrics::incr(&self.metrics.points_not_found_total);
        }
        result
    }
}
