//! Directory-backed object store
//!
//! Keys map onto relative paths below a root directory. Used for the
//! replication mirror and by the command line tool.

use super::{dir_prefix, ListEntry, ObjectStat, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::utils::guess_mimetype;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!("Local store rooted at {:?}", root);
        Ok(LocalStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path below the root
    ///
    /// Rejects keys that would escape the root or that name no file.
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() || key.ends_with('/') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Remove directories left empty by a delete, up to the root
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root.as_path() || fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn walk(&self, dir: &Path, recursive: bool, out: &mut Vec<ListEntry>) -> StoreResult<()> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut children = read.collect::<Result<Vec<_>, std::io::Error>>()?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let path = child.path();
            let key = self.key_for(&path);
            let meta = child.metadata()?;
            if meta.is_dir() {
                if recursive {
                    self.walk(&path, true, out)?;
                } else {
                    out.push(ListEntry::dir(key));
                }
            } else {
                let modified: DateTime<Utc> = meta.modified()?.into();
                out.push(ListEntry::file(key, meta.len(), modified.timestamp()));
            }
        }
        Ok(())
    }

    fn key_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl ObjectStore for LocalStore {
    fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => e.into(),
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::from(e),
        })?;
        self.prune_empty_parents(&path);
        Ok(())
    }

    fn stat(&self, key: &str) -> StoreResult<ObjectStat> {
        let path = self.path_for(key)?;
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::from(e),
        })?;
        if meta.is_dir() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(ObjectStat {
            key: key.to_string(),
            size: meta.len(),
            last_modified: meta.modified()?.into(),
            mimetype: Some(guess_mimetype(key)),
        })
    }

    fn list(&self, prefix: &str, recursive: bool) -> StoreResult<Vec<ListEntry>> {
        let prefix = dir_prefix(prefix);
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.path_for(prefix.trim_end_matches('/'))?
        };
        let mut entries = Vec::new();
        self.walk(&dir, recursive, &mut entries)?;
        Ok(entries)
    }
}
