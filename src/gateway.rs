//! Storage facade
//!
//! [`StorageGateway`] is the only thing callers talk to. Every operation
//! resolves its logical path once, then runs the same pipeline:
//! retention copy, primary store, existence cache, mirror.
//!
//! The primary store is authoritative. Its failures (other than absence) are
//! returned; cache, retention and mirror problems are logged and absorbed.
//! There is no locking across operations on the same path: concurrent writes
//! to one path may interleave their retention copies and cache updates.

use crate::cache::{ExistenceCache, MemoryShardStore, ShardStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{GatewayConfig, ResolvedConfig};
use crate::error::{GatewayError, Result, StoreResult};
use crate::key::{KeyComposer, PhysicalKey, VARIANT_MARKER};
use crate::mirror::MirrorWriter;
use crate::retention::{is_retention_key, RetentionManager};
use crate::store::{dir_prefix, EntryKind, ListEntry, LocalStore, ObjectStat, ObjectStore};
use crate::utils::guess_mimetype;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Object visibility
///
/// The backing store has no private objects, so everything is public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Metadata returned by writes and metadata queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Logical path (subfolder stripped)
    pub path: String,
    /// Unix seconds
    pub timestamp: i64,
    pub size: u64,
    pub visibility: Visibility,
    pub mimetype: String,
}

/// Full content of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub path: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub path: String,
    pub visibility: Visibility,
}

/// Builder for [`StorageGateway`]
///
/// # Examples
///
/// ```
/// use storage_gateway::{GatewayBuilder, MemoryStore};
/// use std::sync::Arc;
///
/// let gateway = GatewayBuilder::new(Arc::new(MemoryStore::new()))
///     .subfolder("media")
///     .use_garbage(true)
///     .build()
///     .unwrap();
///
/// gateway.write("a/b.png", b"X").unwrap();
/// assert!(gateway.has("a/b.png").unwrap());
/// ```
pub struct GatewayBuilder {
    primary: Arc<dyn ObjectStore>,
    config: ResolvedConfig,
    shard_store: Option<Arc<dyn ShardStore>>,
    mirror: Option<Arc<dyn ObjectStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GatewayBuilder {
    pub fn new(primary: Arc<dyn ObjectStore>) -> Self {
        GatewayBuilder {
            primary,
            config: ResolvedConfig::default(),
            shard_store: None,
            mirror: None,
            clock: None,
        }
    }

    /// Take every option from a resolved configuration
    pub fn config(mut self, config: ResolvedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.config.subfolder = subfolder.into();
        self
    }

    pub fn use_garbage(mut self, enabled: bool) -> Self {
        self.config.use_garbage = enabled;
        self
    }

    pub fn never_delete(mut self, enabled: bool) -> Self {
        self.config.never_delete = enabled;
        self
    }

    /// Backend for the existence cache (in-memory if not set)
    pub fn shard_store(mut self, store: Arc<dyn ShardStore>) -> Self {
        self.shard_store = Some(store);
        self
    }

    /// Secondary store; takes precedence over `replication_root`
    pub fn mirror(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.mirror = Some(store);
        self
    }

    pub fn mirror_timeout(mut self, timeout: Duration) -> Self {
        self.config.mirror_timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<StorageGateway> {
        let config = self.config;

        let mirror_store = match (self.mirror, &config.replication_root) {
            (Some(store), _) => Some(store),
            (None, Some(root)) => {
                let local = LocalStore::new(root).map_err(|e| {
                    GatewayError::InvalidConfig(format!("replication_root {:?}: {}", root, e))
                })?;
                Some(Arc::new(local) as Arc<dyn ObjectStore>)
            }
            (None, None) => None,
        };
        let mirror = match mirror_store {
            Some(store) => Some(Arc::new(MirrorWriter::new(store, config.mirror_timeout)?)),
            None => None,
        };

        let shard_store = self
            .shard_store
            .unwrap_or_else(|| Arc::new(MemoryShardStore::new()) as Arc<dyn ShardStore>);
        let cache = Arc::new(ExistenceCache::new(shard_store));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let retention = RetentionManager::new(
            config.use_garbage,
            Arc::clone(&self.primary),
            Arc::clone(&cache),
            mirror.clone(),
            Arc::clone(&clock),
        );

        let keys = KeyComposer::new(&config.subfolder);
        info!(
            "Storage gateway ready: prefix={:?}, garbage={}, never_delete={}, mirror={}",
            keys.prefix(),
            config.use_garbage,
            config.never_delete,
            mirror.is_some()
        );

        Ok(StorageGateway {
            keys,
            primary: self.primary,
            cache,
            retention,
            mirror,
            never_delete: config.never_delete,
            clock,
        })
    }
}

/// Facade over the primary store, existence cache, retention and mirror
pub struct StorageGateway {
    keys: KeyComposer,
    primary: Arc<dyn ObjectStore>,
    cache: Arc<ExistenceCache>,
    retention: RetentionManager,
    mirror: Option<Arc<MirrorWriter>>,
    never_delete: bool,
    clock: Arc<dyn Clock>,
}

impl StorageGateway {
    /// Build from a configuration file's contents
    ///
    /// A configured `replication_root` becomes a [`LocalStore`] mirror.
    pub fn from_config(
        config: &GatewayConfig,
        primary: Arc<dyn ObjectStore>,
        shard_store: Arc<dyn ShardStore>,
    ) -> Result<Self> {
        GatewayBuilder::new(primary)
            .config(config.resolve()?)
            .shard_store(shard_store)
            .build()
    }

    pub fn key_composer(&self) -> &KeyComposer {
        &self.keys
    }

    pub fn existence_cache(&self) -> &ExistenceCache {
        &self.cache
    }

    /// Physical key a logical path maps to
    pub fn resolve(&self, path: &str) -> PhysicalKey {
        self.keys.resolve(path)
    }

    // Writes

    /// Write a file, retaining any previous version first
    pub fn write(&self, path: &str, contents: &[u8]) -> Result<ObjectMetadata> {
        let key = self.keys.resolve(path);
        self.write_key(&key, contents)
    }

    /// Write a file from a reader
    pub fn write_stream(&self, path: &str, mut reader: impl Read) -> Result<ObjectMetadata> {
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        self.write(path, &contents)
    }

    /// Delete, then write; the file is briefly absent in between
    pub fn update(&self, path: &str, contents: &[u8]) -> Result<ObjectMetadata> {
        let key = self.keys.resolve(path);
        self.delete_key(&key)?;
        self.write_key(&key, contents)
    }

    pub fn update_stream(&self, path: &str, mut reader: impl Read) -> Result<ObjectMetadata> {
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        self.update(path, &contents)
    }

    /// Copy then delete; `Ok(false)` if the source does not exist
    ///
    /// Not atomic: a crash between the two steps leaves both copies. With
    /// deletes disabled the source stays, so this degrades to a copy. Paths
    /// naming the same key leave the object alone.
    pub fn rename(&self, path: &str, new_path: &str) -> Result<bool> {
        let from = self.keys.resolve(path);
        let to = self.keys.resolve(new_path);
        if from == to {
            return Ok(self.read_key(&from)?.is_some());
        }

        let Some(contents) = self.read_key(&from)? else {
            debug!("Rename source missing: {}", from);
            return Ok(false);
        };
        self.write_key(&to, &contents)?;
        self.delete_key(&from)?;
        debug!("Renamed {} -> {}", from, to);
        Ok(true)
    }

    /// Read then write; `Ok(false)` if the source does not exist
    pub fn copy(&self, path: &str, new_path: &str) -> Result<bool> {
        let from = self.keys.resolve(path);
        let to = self.keys.resolve(new_path);
        if from == to {
            return Ok(self.read_key(&from)?.is_some());
        }

        let Some(contents) = self.read_key(&from)? else {
            debug!("Copy source missing: {}", from);
            return Ok(false);
        };
        self.write_key(&to, &contents)?;
        debug!("Copied {} -> {}", from, to);
        Ok(true)
    }

    /// Delete a file, retaining it first
    ///
    /// `Ok(false)` if nothing was there. With deletes disabled this reports
    /// success without touching any store.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let key = self.keys.resolve(path);
        self.delete_key(&key)
    }

    /// Delete every object below a directory
    ///
    /// `Ok(true)` when all of them were deleted. Retention copies under
    /// `garbage/` are left in place.
    pub fn delete_dir(&self, dirname: &str) -> Result<bool> {
        if self.never_delete {
            debug!("Delete of dir {} suppressed (never_delete)", dirname);
            return Ok(true);
        }
        let prefix = dir_prefix(self.keys.resolve(dirname).as_str());
        let entries = self
            .primary
            .list(&prefix, true)
            .or_else(|e| if e.is_not_found() { Ok(Vec::new()) } else { Err(e) })
            .map_err(|e| GatewayError::transport(prefix.as_str(), e))?;

        let mut all_deleted = true;
        let files = entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && !is_retention_key(&e.path));
        for entry in files {
            all_deleted &= self.delete_key(&PhysicalKey::from_raw(entry.path))?;
        }
        Ok(all_deleted)
    }

    /// Directories are implicit in object keys
    pub fn create_dir(&self, _dirname: &str) -> Result<()> {
        Ok(())
    }

    /// The store has no per-object ACLs
    pub fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<()> {
        Ok(())
    }

    // Reads

    /// Whether a file exists
    ///
    /// Variant paths (containing '?') always exist and touch neither cache
    /// nor store.
    pub fn has(&self, path: &str) -> Result<bool> {
        if path.contains(VARIANT_MARKER) {
            return Ok(true);
        }
        let key = self.keys.resolve(path);
        self.cache
            .probe(&key, self.primary.as_ref())
            .map_err(|e| GatewayError::transport(key.as_str(), e))
    }

    pub fn read(&self, path: &str) -> Result<Option<FileContents>> {
        let key = self.keys.resolve(path);
        Ok(self.read_key(&key)?.map(|contents| FileContents {
            path: self.logical(&key),
            contents,
        }))
    }

    pub fn read_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let key = self.keys.resolve(path);
        Ok(self
            .read_key(&key)?
            .map(|contents| Box::new(Cursor::new(contents)) as Box<dyn Read + Send>))
    }

    /// List a directory; paths come back as logical paths
    pub fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<ListEntry>> {
        let prefix = dir_prefix(self.keys.resolve(directory).as_str());
        let entries = absent_as_none(&prefix, self.primary.list(&prefix, recursive))?
            .unwrap_or_default();

        Ok(entries
            .into_iter()
            .filter_map(|mut entry| {
                let logical = self.keys.logical(&entry.path)?.to_string();
                entry.path = logical;
                Some(entry)
            })
            .collect())
    }

    pub fn get_metadata(&self, path: &str) -> Result<Option<ObjectMetadata>> {
        let key = self.keys.resolve(path);
        Ok(self.stat_key(&key)?.map(|stat| ObjectMetadata {
            kind: EntryKind::File,
            path: self.logical(&key),
            timestamp: stat.last_modified.timestamp(),
            size: stat.size,
            visibility: Visibility::Public,
            mimetype: stat.mimetype.unwrap_or_else(|| guess_mimetype(key.as_str())),
        }))
    }

    pub fn get_size(&self, path: &str) -> Result<Option<u64>> {
        let key = self.keys.resolve(path);
        Ok(self.stat_key(&key)?.map(|stat| stat.size))
    }

    pub fn get_mimetype(&self, path: &str) -> Result<Option<String>> {
        let key = self.keys.resolve(path);
        Ok(self
            .stat_key(&key)?
            .map(|stat| stat.mimetype.unwrap_or_else(|| guess_mimetype(key.as_str()))))
    }

    /// Last modification, Unix seconds
    pub fn get_timestamp(&self, path: &str) -> Result<Option<i64>> {
        let key = self.keys.resolve(path);
        Ok(self.stat_key(&key)?.map(|stat| stat.last_modified.timestamp()))
    }

    /// Always public
    pub fn get_visibility(&self, path: &str) -> VisibilityRecord {
        let key = self.keys.resolve(path);
        VisibilityRecord {
            path: self.logical(&key),
            visibility: Visibility::Public,
        }
    }

    // Key-level pipeline; keys arrive here already resolved

    // Variant keys stay out of the existence cache and retention

    fn write_key(&self, key: &PhysicalKey, contents: &[u8]) -> Result<ObjectMetadata> {
        let variant = key.is_variant();
        if !variant {
            self.retention.retain(key);
        }

        let timestamp = self.clock.now().timestamp();
        self.primary
            .put(key.as_str(), contents)
            .map_err(|e| GatewayError::transport(key.as_str(), e))?;
        if !variant {
            self.cache.mark_exists(key);
        }

        if let Some(mirror) = &self.mirror {
            mirror.write(key, Arc::from(contents));
        }

        debug!("Wrote {} ({} bytes)", key, contents.len());
        Ok(ObjectMetadata {
            kind: EntryKind::File,
            path: self.logical(key),
            timestamp,
            size: contents.len() as u64,
            visibility: Visibility::Public,
            mimetype: guess_mimetype(key.as_str()),
        })
    }

    fn delete_key(&self, key: &PhysicalKey) -> Result<bool> {
        if self.never_delete {
            debug!("Delete of {} suppressed (never_delete)", key);
            return Ok(true);
        }
        let variant = key.is_variant();
        if !variant {
            self.retention.retain(key);
        }

        let found = match self.primary.delete(key.as_str()) {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(GatewayError::transport(key.as_str(), e)),
        };
        if !variant {
            // also clears a stale "exists" for a key that was already gone
            self.cache.mark_absent(key);
        }
        if !found {
            debug!("Delete of {}: not present", key);
            return Ok(false);
        }

        if let Some(mirror) = &self.mirror {
            mirror.delete(key);
        }

        debug!("Deleted {}", key);
        Ok(true)
    }

    fn read_key(&self, key: &PhysicalKey) -> Result<Option<Vec<u8>>> {
        absent_as_none(key.as_str(), self.primary.get(key.as_str()))
    }

    fn stat_key(&self, key: &PhysicalKey) -> Result<Option<ObjectStat>> {
        absent_as_none(key.as_str(), self.primary.stat(key.as_str()))
    }

    fn logical(&self, key: &PhysicalKey) -> String {
        self.keys
            .logical(key.as_str())
            .unwrap_or(key.as_str())
            .to_string()
    }
}

/// NotFound becomes `None`, anything else a transport error
fn absent_as_none<T>(key: &str, result: StoreResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(GatewayError::transport(key, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup(subfolder: &str) -> (StorageGateway, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = GatewayBuilder::new(store.clone())
            .subfolder(subfolder)
            .build()
            .unwrap();
        (gateway, store)
    }

    #[test]
    fn test_write_applies_prefix_once() {
        let (gateway, store) = setup("media");
        let meta = gateway.write("a/b.png", b"X").unwrap();

        assert_eq!(store.keys(), vec!["media/a/b.png".to_string()]);
        assert_eq!(meta.path, "a/b.png");
        assert_eq!(meta.size, 1);
        assert_eq!(meta.mimetype, "image/png");
        assert_eq!(meta.visibility, Visibility::Public);
        assert_eq!(meta.kind, EntryKind::File);
    }

    #[test]
    fn test_rename_and_copy_apply_prefix_once() {
        let (gateway, store) = setup("media");
        gateway.write("a.txt", b"1").unwrap();

        assert!(gateway.copy("a.txt", "b.txt").unwrap());
        assert!(gateway.rename("b.txt", "c.txt").unwrap());
        assert_eq!(
            store.keys(),
            vec!["media/a.txt".to_string(), "media/c.txt".to_string()]
        );
    }

    #[test]
    fn test_missing_source() {
        let (gateway, _) = setup("");
        assert!(!gateway.rename("nope", "x").unwrap());
        assert!(!gateway.copy("nope", "x").unwrap());
        assert!(gateway.read("nope").unwrap().is_none());
        assert!(gateway.read_stream("nope").unwrap().is_none());
        assert!(gateway.get_size("nope").unwrap().is_none());
        assert!(!gateway.delete("nope").unwrap());
    }

    #[test]
    fn test_zero_byte_file_exists() {
        let (gateway, store) = setup("");
        store.put("empty.txt", b"").unwrap();
        assert!(gateway.has("empty.txt").unwrap());
        assert_eq!(gateway.get_size("empty.txt").unwrap(), Some(0));
    }

    #[test]
    fn test_read_stream() {
        let (gateway, _) = setup("");
        gateway.write("doc.txt", b"stream me").unwrap();
        let mut out = String::new();
        gateway
            .read_stream("doc.txt")
            .unwrap()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "stream me");
    }

    #[test]
    fn test_write_stream_and_update() {
        let (gateway, _) = setup("");
        gateway.write_stream("f.txt", &b"one"[..]).unwrap();
        let meta = gateway.update_stream("f.txt", &b"three"[..]).unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(gateway.read("f.txt").unwrap().unwrap().contents, b"three");

        // update of a missing file is just a write
        gateway.update("new.txt", b"n").unwrap();
        assert!(gateway.has("new.txt").unwrap());
    }

    #[test]
    fn test_list_contents_strips_prefix() {
        let (gateway, store) = setup("media");
        gateway.write("a/1.txt", b"1").unwrap();
        gateway.write("a/sub/2.txt", b"2").unwrap();
        store.put("other/x.txt", b"x").unwrap();

        let paths: Vec<String> = gateway
            .list_contents("", true)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["a/1.txt", "a/sub/2.txt"]);

        let shallow = gateway.list_contents("a", false).unwrap();
        assert_eq!(shallow.len(), 2);
        assert_eq!(shallow[1].path, "a/sub");
        assert_eq!(shallow[1].kind, EntryKind::Dir);
    }

    #[test]
    fn test_metadata_queries() {
        let (gateway, _) = setup("");
        gateway.write("pic.jpg", b"1234").unwrap();

        let meta = gateway.get_metadata("pic.jpg").unwrap().unwrap();
        assert_eq!(meta.size, 4);
        assert_eq!(meta.path, "pic.jpg");
        assert_eq!(gateway.get_mimetype("pic.jpg").unwrap().unwrap(), "image/jpeg");
        assert!(gateway.get_timestamp("pic.jpg").unwrap().unwrap() > 0);
        assert!(gateway.get_metadata("missing.jpg").unwrap().is_none());
    }

    #[test]
    fn test_visibility_is_constant() {
        let (gateway, _) = setup("media");
        gateway.set_visibility("a.txt", Visibility::Private).unwrap();
        assert_eq!(
            gateway.get_visibility("a.txt"),
            VisibilityRecord {
                path: "a.txt".to_string(),
                visibility: Visibility::Public,
            }
        );
        gateway.create_dir("some/dir").unwrap();
    }

    #[test]
    fn test_delete_dir() {
        let (gateway, store) = setup("media");
        gateway.write("d/1.txt", b"1").unwrap();
        gateway.write("d/e/2.txt", b"2").unwrap();
        gateway.write("keep.txt", b"k").unwrap();

        assert!(gateway.delete_dir("d").unwrap());
        assert_eq!(store.keys(), vec!["media/keep.txt".to_string()]);
        assert!(!gateway.has("d/1.txt").unwrap());
    }

    #[test]
    fn test_metadata_serializes_type_field() {
        let (gateway, _) = setup("");
        let meta = gateway.write("a.txt", b"x").unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["visibility"], "public");
    }

    #[test]
    fn test_rename_onto_itself_keeps_object() {
        let (gateway, store) = setup("media");
        gateway.write("a.txt", b"A").unwrap();
        gateway.write("b.txt", b"B").unwrap();

        assert!(gateway.rename("a.txt", "a.txt").unwrap());
        assert!(gateway.rename("b.txt", "/b.txt").unwrap());
        assert!(gateway.copy("/a.txt", "a.txt").unwrap());
        assert!(!gateway.rename("gone.txt", "/gone.txt").unwrap());

        assert!(gateway.has("a.txt").unwrap());
        assert!(gateway.has("b.txt").unwrap());
        assert_eq!(gateway.read("b.txt").unwrap().unwrap().contents, b"B");
        assert_eq!(
            store.keys(),
            vec!["media/a.txt".to_string(), "media/b.txt".to_string()]
        );
    }

    #[test]
    fn test_variant_write_skips_cache_and_retention() {
        let store = Arc::new(MemoryStore::new());
        let gateway = GatewayBuilder::new(store.clone())
            .use_garbage(true)
            .build()
            .unwrap();

        gateway.write("thumb.png?w=1", b"1").unwrap();
        gateway.write("thumb.png?w=1", b"2").unwrap();

        assert_eq!(store.keys(), vec!["thumb.png?w=1".to_string()]);
        assert!(!gateway
            .existence_cache()
            .is_known_to_exist(&gateway.resolve("thumb.png?w=1")));

        assert!(gateway.delete("thumb.png?w=1").unwrap());
        assert!(store.is_empty());
    }
}
