//! Existence cache
//!
//! Remembers which physical keys are known to exist, so `has` can skip a
//! round-trip to the store. Keys are grouped into coarse shards (one hex
//! digit of the key digest), and each shard is one entry in a [`ShardStore`].
//!
//! Only positive knowledge is recorded. A key that is absent from its shard
//! means "unknown", never "absent": [`ExistenceCache::mark_absent`] removes
//! the key instead of storing `false`, so the next check goes back to the
//! store and cannot be fooled by changes made outside the gateway.
//!
//! Updates are read-modify-write on a whole shard. The backing store is not
//! assumed to be atomic, so every update holds the shard's lock.

mod shard_store;

pub use shard_store::{FileShardStore, LruShardStore, MemoryShardStore, ShardMap, ShardStore};

use crate::error::StoreResult;
use crate::key::PhysicalKey;
use crate::store::ObjectStore;
use crate::utils::{shard_index, shard_key};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

const SHARD_COUNT: usize = 16;

/// Sharded index of keys known to exist
pub struct ExistenceCache {
    backend: Arc<dyn ShardStore>,
    locks: [Mutex<()>; SHARD_COUNT],
}

impl ExistenceCache {
    pub fn new(backend: Arc<dyn ShardStore>) -> Self {
        ExistenceCache {
            backend,
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    /// Shard holding a key
    pub fn shard_for(key: &PhysicalKey) -> String {
        shard_key(key.as_str())
    }

    /// True only if the key's shard explicitly records it as existing
    pub fn is_known_to_exist(&self, key: &PhysicalKey) -> bool {
        let shard = Self::shard_for(key);
        self.backend
            .fetch(&shard)
            .and_then(|map| map.get(key.as_str()).copied())
            .unwrap_or(false)
    }

    /// Record that a key exists; idempotent
    pub fn mark_exists(&self, key: &PhysicalKey) {
        let shard = Self::shard_for(key);
        let _guard = self.locks[shard_index(&shard)].lock();

        let mut map = self.backend.fetch(&shard).unwrap_or_default();
        if map.get(key.as_str()) == Some(&true) {
            return;
        }
        map.insert(key.as_str().to_string(), true);
        self.persist(&shard, &map);
    }

    /// Forget a key, so the next check asks the store
    pub fn mark_absent(&self, key: &PhysicalKey) {
        let shard = Self::shard_for(key);
        let _guard = self.locks[shard_index(&shard)].lock();

        let Some(mut map) = self.backend.fetch(&shard) else {
            return;
        };
        if map.remove(key.as_str()).is_some() {
            self.persist(&shard, &map);
        }
    }

    /// Cache first, then a live stat against `store`
    ///
    /// A successful stat means the object exists, whatever its size, and is
    /// recorded. Absence is `Ok(false)`; any other store failure is returned.
    pub fn probe(&self, key: &PhysicalKey, store: &dyn ObjectStore) -> StoreResult<bool> {
        if self.is_known_to_exist(key) {
            debug!("Existence cache hit: {}", key);
            return Ok(true);
        }

        match store.stat(key.as_str()) {
            Ok(stat) => {
                debug!("Existence confirmed by store: {} ({} bytes)", key, stat.size);
                self.mark_exists(key);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn persist(&self, shard: &str, map: &ShardMap) {
        match self.backend.save(shard, map) {
            Ok(()) => debug!("Saved existence shard {} ({} keys)", shard, map.len()),
            Err(e) => warn!("Failed to save existence shard {}: {}", shard, e),
        }
    }
}
