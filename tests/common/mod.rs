//! Shared test doubles for gateway integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage_gateway::{
    is_retention_key, CacheError, ListEntry, MemoryShardStore, MemoryStore, ObjectStat,
    ObjectStore, ShardMap, ShardStore, StoreError, StoreResult,
};

/// Memory store that counts every call made to it
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl ObjectStore for CountingStore {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.hit();
        self.inner.put(key, data)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.hit();
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.hit();
        self.inner.delete(key)
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        self.hit();
        self.inner.stat(key)
    }

    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>> {
        self.hit();
        self.inner.list(prefix, recursive)
    }
}

/// Store that rejects every request
pub struct FailingStore;

impl FailingStore {
    fn refuse(key: &str) -> StoreError {
        StoreError::Transport(format!("refused {}", key))
    }
}

impl ObjectStore for FailingStore {
    fn put(&self, key: &str, _data: &[u8]) -> StoreResult<()> {
        Err(Self::refuse(key))
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        Err(Self::refuse(key))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        Err(Self::refuse(key))
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        Err(Self::refuse(key))
    }

    fn list(&self, prefix: &str, _recursive: bool) -> StoreResult<Vec<ListEntry>> {
        Err(Self::refuse(prefix))
    }
}

/// Shard store that counts fetches and saves
#[derive(Default)]
pub struct CountingShardStore {
    pub inner: MemoryShardStore,
    calls: AtomicUsize,
}

impl CountingShardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShardStore for CountingShardStore {
    fn fetch(&self, shard: &str) -> Option<ShardMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(shard)
    }

    fn save(&self, shard: &str, map: &ShardMap) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save(shard, map)
    }
}

/// Memory store that refuses writes into the retention namespace
#[derive(Default)]
pub struct NoRetentionWritesStore {
    pub inner: MemoryStore,
}

impl NoRetentionWritesStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ObjectStore for NoRetentionWritesStore {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        if is_retention_key(key) {
            return Err(StoreError::Transport(format!("quota exceeded for {}", key)));
        }
        self.inner.put(key, data)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        self.inner.stat(key)
    }

    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>> {
        self.inner.list(prefix, recursive)
    }
}

/// Memory store whose objects can be stat'ed but never downloaded
#[derive(Default)]
pub struct UnreadableStore {
    pub inner: MemoryStore,
}

impl UnreadableStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ObjectStore for UnreadableStore {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.inner.put(key, data)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        Err(StoreError::Transport(format!("download of {} refused", key)))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        self.inner.stat(key)
    }

    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>> {
        self.inner.list(prefix, recursive)
    }
}
