mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{byte_masks, neighbourhood, publish, DATASET, TARGET_POINT, TARGET_SIGNATURE};
use sigsearch::cache::MetadataCache;
use sigsearch::config::{LookupConfig, LookupOptions};
use sigsearch::query::MemoryEngine;
use sigsearch::store::{metadata_key, BlockStore, MemoryBlockStore, StoreError};
use sigsearch::SignatureService;

/// Slow store that counts metadata reads and can be told to fail them.
struct CountingStore {
    inner: MemoryBlockStore,
    metadata_reads: AtomicUsize,
    failures_left: AtomicUsize,
}

impl CountingStore {
    fn new(failures: usize) -> Self {
        let inner = MemoryBlockStore::new();
        publish(DATASET, &byte_masks(), &neighbourhood(), |k, b| inner.put(k, b));
        Self {
            inner,
            metadata_reads: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

impl BlockStore for CountingStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key)
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if key == metadata_key(DATASET) {
            self.metadata_reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StoreError::Transient {
                    key: key.to_string(),
                    reason: "injected".into(),
                });
            }
        }
        self.inner.get_bytes(key)
    }
}

#[test]
fn test_concurrent_lookups_fetch_metadata_once() {
    let store = Arc::new(CountingStore::new(0));
    let service = Arc::new(SignatureService::new(
        store.clone(),
        Arc::new(MemoryEngine::new()),
        LookupConfig::new("samples"),
    ));

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service
                    .fetch_signature(DATASET, TARGET_POINT, &LookupOptions::default())
                    .unwrap()
                    .signature
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), TARGET_SIGNATURE);
    }
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);

    let metrics = service.metrics();
    assert_eq!(metrics.metadata_fetches_total, 1);
    assert_eq!(metrics.lookups_total, threads as u64);
}

#[test]
fn test_failed_metadata_load_is_retried_later() {
    let store = Arc::new(CountingStore::new(1));
    let service = SignatureService::new(
        store.clone(),
        Arc::new(MemoryEngine::new()),
        LookupConfig::new("samples"),
    );

    let err = service
        .fetch_signature(DATASET, TARGET_POINT, &LookupOptions::default())
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!service.cache().contains(DATASET));

    let hit = service
        .fetch_signature(DATASET, TARGET_POINT, &LookupOptions::default())
        .unwrap();
    assert_eq!(hit.signature, TARGET_SIGNATURE);
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_shared_cache_across_services() {
    let store = Arc::new(CountingStore::new(0));
    let cache = Arc::new(MetadataCache::new());
    let make = || {
        SignatureService::with_cache(
            store.clone(),
            Arc::new(MemoryEngine::new()),
            LookupConfig::new("samples"),
            Arc::clone(&cache),
        )
    };
    let a = make();
    let b = make();

    a.partitions_for(DATASET, TARGET_SIGNATURE).unwrap();
    b.partitions_for(DATASET, TARGET_SIGNATURE).unwrap();
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.hit_count(), 1);
}
