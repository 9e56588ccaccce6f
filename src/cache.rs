//! Process-wide dataset metadata cache.
//!
//! Metadata is immutable once a dataset is published, so entries never
//! expire. Loading is serialized per dataset: concurrent first requests for
//! the same dataset wait on one fetch instead of each hitting the store.
//! Requests for different datasets do not block each other. Failed loads are
//! not cached; the next request tries again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sigsearch_core::DatasetMetadata;

use crate::error::LookupError;
use crate::resolve::load_metadata;
use crate::store::BlockStore;

#[derive(Debug, Default)]
pub struct MetadataCache {
    loaded: RwLock<HashMap<String, Arc<DatasetMetadata>>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    fetches: AtomicU64,
    hits: AtomicU64,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `dataset`, fetching `{dataset}/info.json` on first use.
    pub fn get_metadata(
        &self,
        store: &dyn BlockStore,
        dataset: &str,
    ) -> Result<Arc<DatasetMetadata>, LookupError> {
        self.get_or_load(dataset, || load_metadata(store, dataset))
    }

    /// Cached value for `dataset`, or the result of `load` (at most one
    /// concurrent `load` per dataset).
    pub fn get_or_load<F>(&self, dataset: &str, load: F) -> Result<Arc<DatasetMetadata>, LookupError>
    where
        F: FnOnce() -> Result<DatasetMetadata, LookupError>,
    {
        if let Some(meta) = self.lookup(dataset) {
            return Ok(meta);
        }

        let slot = {
            let mut inflight = self.inflight.lock();
            Arc::clone(
                inflight
                    .entry(dataset.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        let result = {
            let _guard = slot.lock();
            // the previous holder may have filled the entry while we waited;
            // that is the tail of a miss, so it does not count as a hit
            match self.peek(dataset) {
                Some(meta) => Ok(meta),
                None => self.load_locked(dataset, load),
            }
        };

        self.release(dataset, &slot);
        result
    }

    fn load_locked<F>(&self, dataset: &str, load: F) -> Result<Arc<DatasetMetadata>, LookupError>
    where
        F: FnOnce() -> Result<DatasetMetadata, LookupError>,
    {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(dataset, "loading dataset metadata");
        match load() {
            Ok(meta) => {
                let meta = Arc::new(meta);
                self.loaded
                    .write()
                    .insert(dataset.to_string(), Arc::clone(&meta));
                Ok(meta)
            }
            Err(err) => {
                tracing::warn!(dataset, error = %err, "metadata load failed");
                Err(err)
            }
        }
    }

    /// Preload an entry, e.g. from a fixture. Replaces any existing value.
    pub fn insert(&self, dataset: impl Into<String>, meta: DatasetMetadata) {
        self.loaded.write().insert(dataset.into(), Arc::new(meta));
    }

    pub fn contains(&self, dataset: &str) -> bool {
        self.loaded.read().contains_key(dataset)
    }

    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.read().is_empty()
    }

    /// Number of loads started (successful or not)
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn lookup(&self, dataset: &str) -> Option<Arc<DatasetMetadata>> {
        let meta = self.peek(dataset)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(meta)
    }

    fn peek(&self, dataset: &str) -> Option<Arc<DatasetMetadata>> {
        self.loaded.read().get(dataset).cloned()
    }

    // Drop the in-flight slot once nobody else holds it. Clones are only
    // taken under the `inflight` lock, so the count cannot grow under us.
    fn release(&self, dataset: &str, slot: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock();
        let idle = inflight
            .get(dataset)
            .map_or(false, |current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) <= 2);
        if idle {
            inflight.remove(dataset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn meta(block_size: u32) -> DatasetMetadata {
        DatasetMetadata::new(block_size, [1, 2, 3, 4]).unwrap()
    }

    #[test]
    fn test_second_call_is_a_hit() {
        let cache = MetadataCache::new();
        let first = cache.get_or_load("a", || Ok(meta(10))).unwrap();
        let second = cache
            .get_or_load("a", || panic!("must not reload"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = MetadataCache::new();
        let err = cache
            .get_or_load("a", || {
                Err(LookupError::MetadataNotFound {
                    dataset: "a".into(),
                    reason: "timeout".into(),
                })
            })
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.contains("a"));

        let meta = cache.get_or_load("a", || Ok(meta(7))).unwrap();
        assert_eq!(meta.block_size(), 7);
        assert_eq!(cache.fetch_count(), 2);
        assert!(cache.inflight.lock().is_empty());
    }

    #[test]
    fn test_concurrent_first_requests_load_once() {
        let cache = Arc::new(MetadataCache::new());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_load("shared", || {
                            thread::sleep(Duration::from_millis(50));
                            Ok(meta(1000))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().block_size(), 1000);
        }
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_waiter_on_inflight_load_is_not_a_hit() {
        let cache = Arc::new(MetadataCache::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let loader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache
                    .get_or_load("shared", || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(meta(1000))
                    })
                    .unwrap()
            })
        };
        started_rx.recv().unwrap();

        let waiter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_load("shared", || panic!("must not reload")).unwrap())
        };
        // map entry + loader + waiter
        while Arc::strong_count(&cache.inflight.lock()["shared"]) < 3 {
            thread::yield_now();
        }
        release_tx.send(()).unwrap();

        let first = loader.join().unwrap();
        let second = waiter.join().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.hit_count(), 0);
        assert!(cache.inflight.lock().is_empty());

        cache.get_or_load("shared", || panic!("must not reload")).unwrap();
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_distinct_datasets_load_independently() {
        let cache = MetadataCache::new();
        cache.get_or_load("a", || Ok(meta(1))).unwrap();
        cache.get_or_load("b", || Ok(meta(2))).unwrap();
        cache.insert("c", meta(3));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.fetch_count(), 2);
        assert_eq!(cache.get_or_load("c", || Ok(meta(99))).unwrap().block_size(), 3);
    }
}
