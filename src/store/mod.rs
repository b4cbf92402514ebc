//! Object store capability
//!
//! The gateway speaks to its primary store and its mirror through
//! [`ObjectStore`]. Wire protocols live behind this trait; the crate ships an
//! in-memory store and a directory-backed store.

mod local;

pub use local::LocalStore;

use crate::error::{StoreError, StoreResult};
use crate::utils::guess_mimetype;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Result of a stat call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Content type reported by the store, if it tracks one
    pub mimetype: Option<String>,
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub path: String,
    pub kind: EntryKind,
    /// None for directories
    pub size: Option<u64>,
    /// Unix seconds, None for directories
    pub timestamp: Option<i64>,
}

impl ListEntry {
    pub fn file(path: impl Into<String>, size: u64, timestamp: i64) -> Self {
        ListEntry {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            timestamp: Some(timestamp),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        ListEntry {
            path: path.into(),
            kind: EntryKind::Dir,
            size: None,
            timestamp: None,
        }
    }
}

/// Put/get/delete/stat/list over flat keys
///
/// Implementations report absence as [`StoreError::NotFound`] and everything
/// else that goes wrong as another variant. A zero-byte object must stat as
/// `size == 0`, never as absent.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    fn delete(&self, key: &str) -> StoreResult<()>;

    fn stat(&self, key: &str) -> StoreResult<ObjectStat>;

    /// List entries under `prefix`
    ///
    /// Non-recursive listings return direct children, with subdirectories as
    /// [`EntryKind::Dir`] entries. Recursive listings return every object.
    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>>;
}

/// Normalize a listing prefix to "" or "dir/"
pub(crate) fn dir_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("Key cannot be empty".to_string()));
        }
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .read()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        let objects = self.objects.read();
        let object = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(ObjectStat {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: object.modified,
            mimetype: Some(guess_mimetype(key)),
        })
    }

    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>> {
        let prefix = dir_prefix(prefix);
        let objects = self.objects.read();
        let mut entries = Vec::new();
        let mut seen_dirs = BTreeSet::new();

        for (key, object) in objects.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            match rest.split_once('/') {
                Some((dir, _)) if !recursive => {
                    if seen_dirs.insert(dir.to_string()) {
                        entries.push(ListEntry::dir(format!("{}{}", prefix, dir)));
                    }
                }
                _ => entries.push(ListEntry::file(
                    key.clone(),
                    object.data.len() as u64,
                    object.modified.timestamp(),
                )),
            }
        }

        Ok(entries)
    }
}
