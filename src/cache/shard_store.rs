//! Key-value backends for existence shards
//!
//! The existence cache treats these as black boxes with fetch/save semantics.
//! Eviction and expiry belong to the backend.

use crate::error::CacheError;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Physical key → known-to-exist flag, for every key in one shard
pub type ShardMap = BTreeMap<String, bool>;

/// Fetch/save by shard key
pub trait ShardStore: Send + Sync {
    /// Current mapping for a shard; `None` when absent or unreadable
    fn fetch(&self, shard: &str) -> Option<ShardMap>;

    /// Replace the mapping for a shard
    fn save(&self, shard: &str, map: &ShardMap) -> Result<(), CacheError>;
}

/// Unbounded in-memory shard store
#[derive(Debug, Default)]
pub struct MemoryShardStore {
    shards: RwLock<HashMap<String, ShardMap>>,
}

impl MemoryShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shards currently held
    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }
}

impl ShardStore for MemoryShardStore {
    fn fetch(&self, shard: &str) -> Option<ShardMap> {
        self.shards.read().get(shard).cloned()
    }

    fn save(&self, shard: &str, map: &ShardMap) -> Result<(), CacheError> {
        self.shards.write().insert(shard.to_string(), map.clone());
        Ok(())
    }
}

/// Bounded in-memory shard store with LRU eviction
///
/// An evicted shard reads as absent, which the existence cache treats as
/// "unknown".
pub struct LruShardStore {
    shards: Mutex<LruCache<String, ShardMap>>,
}

impl LruShardStore {
    /// Create a store holding at most `capacity` shards (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        LruShardStore {
            shards: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.lock().is_empty()
    }
}

impl ShardStore for LruShardStore {
    fn fetch(&self, shard: &str) -> Option<ShardMap> {
        self.shards.lock().get(shard).cloned()
    }

    fn save(&self, shard: &str, map: &ShardMap) -> Result<(), CacheError> {
        self.shards.lock().put(shard.to_string(), map.clone());
        Ok(())
    }
}

/// One JSON file per shard below a directory
///
/// Survives process restarts, which is what the command line tool needs.
#[derive(Debug, Clone)]
pub struct FileShardStore {
    dir: PathBuf,
}

impl FileShardStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileShardStore { dir })
    }

    fn shard_path(&self, shard: &str) -> PathBuf {
        self.dir.join(format!("shard-{}.json", shard))
    }
}

impl ShardStore for FileShardStore {
    fn fetch(&self, shard: &str) -> Option<ShardMap> {
        let raw = match fs::read(self.shard_path(shard)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!("Shard {} unreadable: {}", shard, e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(map) => Some(map),
            Err(e) => {
                debug!("Shard {} corrupt, treating as absent: {}", shard, e);
                None
            }
        }
    }

    fn save(&self, shard: &str, map: &ShardMap) -> Result<(), CacheError> {
        let encoded = serde_json::to_vec(map)?;
        // write-then-rename so readers never see a torn shard
        let tmp = self.dir.join(format!(".shard-{}.json.tmp", shard));
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, self.shard_path(shard))?;
        Ok(())
    }
}
