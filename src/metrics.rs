use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-local lookup counters.
#[derive(Debug, Default)]
pub struct LookupMetrics {
    pub lookups_total: AtomicU64,
    pub points_not_found_total: AtomicU64,
    pub metadata_not_found_total: AtomicU64,
    pub similar_queries_total: AtomicU64,
    pub query_failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub lookups_total: u64,
    pub points_not_found_total: u64,
    pub metadata_not_found_total: u64,
    pub similar_queries_total: u64,
    pub query_failures_total: u64,
    pub metadata_fetches_total: u64,
    pub metadata_cache_hits_total: u64,
}

impl LookupMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter values; the cache counters are supplied by the owner of the cache.
    pub fn snapshot(&self, metadata_fetches: u64, metadata_cache_hits: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            lookups_total: self.lookups_total.load(Ordering::Relaxed),
            points_not_found_total: self.points_not_found_total.load(Ordering::Relaxed),
            metadata_not_found_total: self.metadata_not_found_total.load(Ordering::Relaxed),
            similar_queries_total: self.similar_queries_total.load(Ordering::Relaxed),
            query_failures_total: self.query_failures_total.load(Ordering::Relaxed),
            metadata_fetches_total: metadata_fetches,
            metadata_cache_hits_total: metadata_cache_hits,
        }
    }
}

impl MetricsSnapshot {
    /// Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        format!(
            concat!(
                "# TYPE sigsearch_lookups_total counter\n",
                "sigsearch_lookups_total {}\n",
                "# TYPE sigsearch_points_not_found_total counter\n",
                "sigsearch_points_not_found_total {}\n",
                "# TYPE sigsearch_metadata_not_found_total counter\n",
                "sigsearch_metadata_not_found_total {}\n",
                "# TYPE sigsearch_similar_queries_total counter\n",
                "sigsearch_similar_queries_total {}\n",
                "# TYPE sigsearch_query_failures_total counter\n",
                "sigsearch_query_failures_total {}\n",
                "# TYPE sigsearch_metadata_fetches_total counter\n",
                "sigsearch_metadata_fetches_total {}\n",
                "# TYPE sigsearch_metadata_cache_hits_total counter\n",
                "sigsearch_metadata_cache_hits_total {}\n"
            ),
            self.lookups_total,
            self.points_not_found_total,
            self.metadata_not_found_total,
            self.similar_queries_total,
            self.query_failures_total,
            self.metadata_fetches_total,
            self.metadata_cache_hits_total,
        )
    }
}
