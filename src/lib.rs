//! # Storage Gateway - Object Store Facade
//!
//! `storage-gateway` sits in front of a remote object store and adds what the
//! raw store lacks:
//!
//! - **Existence cache** so repeated `has` checks skip the round-trip
//! - **Retention ("garbage") copies** of the previous version before every
//!   overwrite or delete, under `garbage/<YYYYMMDD>/`
//! - **Best-effort mirroring** of writes and deletes to a secondary store
//! - **Subfolder prefixing** of every caller path, applied exactly once
//!
//! The store and the cache backend are capabilities supplied by the host:
//! anything implementing [`ObjectStore`] and [`ShardStore`].
//!
//! ## Quick Start
//!
//! ```rust
//! use storage_gateway::{GatewayBuilder, MemoryStore, Result};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let gateway = GatewayBuilder::new(store.clone())
//!     .use_garbage(true)
//!     .build()?;
//!
//! gateway.write("a/b.png", b"X")?;
//! assert!(gateway.has("a/b.png")?);
//!
//! // previous content is kept under garbage/<today>/
//! gateway.delete("a/b.png")?;
//! assert!(!gateway.has("a/b.png")?);
//! assert_eq!(store.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## From configuration
//!
//! ```rust,no_run
//! use storage_gateway::{GatewayConfig, LocalStore, MemoryShardStore, StorageGateway};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = GatewayConfig::from_file("gateway.toml")?;
//! let gateway = StorageGateway::from_config(
//!     &config,
//!     Arc::new(LocalStore::new("/srv/objects")?),
//!     Arc::new(MemoryShardStore::new()),
//! )?;
//! gateway.write("docs/readme.txt", b"hello")?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod key;
pub mod mirror;
pub mod retention;
pub mod store;
pub mod utils;

pub use cache::{
    ExistenceCache, FileShardStore, LruShardStore, MemoryShardStore, ShardMap, ShardStore,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{GatewayConfig, ResolvedConfig, StoreCredentials};
pub use error::{CacheError, GatewayError, Result, StoreError, StoreResult};
pub use gateway::{
    FileContents, GatewayBuilder, ObjectMetadata, StorageGateway, Visibility, VisibilityRecord,
};
pub use key::{KeyComposer, PhysicalKey, VARIANT_MARKER};
pub use mirror::{MirrorOutcome, MirrorWriter, DEFAULT_QUEUE_DEPTH};
pub use retention::{
    is_retention_key, retention_key, RetentionManager, RetentionOutcome, GARBAGE_PREFIX,
};
pub use store::{EntryKind, ListEntry, LocalStore, MemoryStore, ObjectStat, ObjectStore};
