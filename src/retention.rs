//! Retention ("garbage") copies
//!
//! Before an object is overwritten or deleted, its current content is copied
//! to `garbage/<YYYYMMDD>/<key>`. A second copy of the same key on the same
//! UTC day gets a microsecond timestamp appended, bumped until the key is
//! free, so an earlier copy is never overwritten.
//!
//! Retention copies are written once and never touched again by the gateway.

use crate::cache::ExistenceCache;
use crate::clock::Clock;
use crate::key::PhysicalKey;
use crate::mirror::MirrorWriter;
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespace holding retention copies
pub const GARBAGE_PREFIX: &str = "garbage";

/// What a retention attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionOutcome {
    /// Retention is switched off
    Disabled,
    /// The object does not exist (or could not be read)
    NothingToRetain,
    /// A copy was written at this key
    Retained(PhysicalKey),
    /// The copy could not be written; the caller carries on regardless
    Failed,
}

/// Dated retention key for `key` at `now`, without collision handling
pub fn retention_key(key: &PhysicalKey, now: DateTime<Utc>) -> PhysicalKey {
    PhysicalKey::from_raw(format!(
        "{}/{}/{}",
        GARBAGE_PREFIX,
        now.format("%Y%m%d"),
        key
    ))
}

/// Whether `key` lies in the retention namespace
pub fn is_retention_key(key: &str) -> bool {
    key.strip_prefix(GARBAGE_PREFIX)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Copies objects aside before destructive operations
pub struct RetentionManager {
    enabled: bool,
    primary: Arc<dyn ObjectStore>,
    cache: Arc<ExistenceCache>,
    mirror: Option<Arc<MirrorWriter>>,
    clock: Arc<dyn Clock>,
}

impl RetentionManager {
    pub fn new(
        enabled: bool,
        primary: Arc<dyn ObjectStore>,
        cache: Arc<ExistenceCache>,
        mirror: Option<Arc<MirrorWriter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RetentionManager {
            enabled,
            primary,
            cache,
            mirror,
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Copy the current object at `key` aside, if retention applies
    ///
    /// Never fails the caller: problems are logged and reported through the
    /// returned outcome only.
    pub fn retain(&self, key: &PhysicalKey) -> RetentionOutcome {
        if !self.enabled {
            return RetentionOutcome::Disabled;
        }

        match self.cache.probe(key, self.primary.as_ref()) {
            Ok(true) => {}
            Ok(false) => return RetentionOutcome::NothingToRetain,
            Err(e) => {
                warn!("Retention skipped, existence of {} unknown: {}", key, e);
                return RetentionOutcome::NothingToRetain;
            }
        }

        let data = match self.primary.get(key.as_str()) {
            Ok(data) => data,
            Err(e) => {
                debug!("Retention skipped, {} unreadable: {}", key, e);
                return RetentionOutcome::NothingToRetain;
            }
        };

        let target = match self.free_retention_key(key) {
            Some(target) => target,
            None => return RetentionOutcome::Failed,
        };

        if let Err(e) = self.primary.put(target.as_str(), &data) {
            warn!("Retention copy of {} to {} failed: {}", key, target, e);
            return RetentionOutcome::Failed;
        }
        self.cache.mark_exists(&target);

        if let Some(mirror) = &self.mirror {
            mirror.write(&target, Arc::from(data));
        }

        info!("Retained {} as {}", key, target);
        RetentionOutcome::Retained(target)
    }

    /// First unused retention key for today
    fn free_retention_key(&self, key: &PhysicalKey) -> Option<PhysicalKey> {
        let now = self.clock.now();
        let base = retention_key(key, now);
        if !self.occupied(&base)? {
            return Some(base);
        }

        let mut stamp = now.timestamp_micros();
        loop {
            let candidate = PhysicalKey::from_raw(format!("{}{}", base, stamp));
            if !self.occupied(&candidate)? {
                debug!("Retention key {} taken, using {}", base, candidate);
                return Some(candidate);
            }
            stamp += 1;
        }
    }

    fn occupied(&self, key: &PhysicalKey) -> Option<bool> {
        match self.cache.probe(key, self.primary.as_ref()) {
            Ok(exists) => Some(exists),
            Err(e) => {
                warn!("Retention copy not written, cannot check {}: {}", key, e);
                None
            }
        }
    }
}
