use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{BlockStore, StoreError};

/// In-process bucket, for tests and local fixtures.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    gets: AtomicU64,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.write().insert(key.into(), bytes.into());
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Number of `get_bytes` calls served, hits and misses alike
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }
}

impl BlockStore for MemoryBlockStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.read().contains_key(key))
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = MemoryBlockStore::new();
        assert!(store.is_empty());
        store.put("d/info.json", b"{}".to_vec());

        assert!(store.exists("d/info.json").unwrap());
        assert_eq!(store.get_bytes("d/info.json").unwrap(), b"{}");
        assert!(store.get_bytes("d/blocks/0_0_0").unwrap_err().is_not_found());
        assert_eq!(store.get_count(), 2);

        assert!(store.remove("d/info.json").is_some());
        assert!(!store.exists("d/info.json").unwrap());
    }
}
