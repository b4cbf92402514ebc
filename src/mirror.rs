//! Best-effort mirroring to a secondary store
//!
//! Mirror calls are handed to a single long-lived worker thread through a
//! bounded queue and awaited for at most the configured timeout. A slow call
//! keeps running on the worker; calls that find the queue full are dropped.
//! Nothing here can change the outcome the primary store reported.

use crate::error::StoreResult;
use crate::key::PhysicalKey;
use crate::store::ObjectStore;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Mirror calls that may wait behind a busy worker
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// What happened to one mirror operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    Applied,
    /// Nothing to do (delete of an object the mirror does not hold)
    Skipped,
    Failed,
    TimedOut,
    /// The worker was too far behind to accept it
    Dropped,
}

type MirrorCall = Box<dyn FnOnce(&dyn ObjectStore) -> StoreResult<bool> + Send>;

struct Job {
    call: MirrorCall,
    reply: Sender<StoreResult<bool>>,
}

/// Duplicates writes and deletes onto a secondary store
pub struct MirrorWriter {
    jobs: Sender<Job>,
    timeout: Duration,
}

impl MirrorWriter {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> std::io::Result<Self> {
        Self::with_queue_depth(store, timeout, DEFAULT_QUEUE_DEPTH)
    }

    /// Start the worker with room for `depth` queued calls (at least one)
    pub fn with_queue_depth(
        store: Arc<dyn ObjectStore>,
        timeout: Duration,
        depth: usize,
    ) -> std::io::Result<Self> {
        let (jobs, queue) = channel::bounded(depth.max(1));
        thread::Builder::new()
            .name("mirror-worker".to_string())
            .spawn(move || drain(store, queue))?;
        Ok(MirrorWriter { jobs, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Copy `data` to `key` on the mirror
    pub fn write(&self, key: &PhysicalKey, data: Arc<[u8]>) -> MirrorOutcome {
        let target = key.as_str().to_string();
        self.run_bounded("write", key, move |store| {
            store.put(&target, &data)?;
            Ok(true)
        })
    }

    /// Remove `key` from the mirror if it holds it
    pub fn delete(&self, key: &PhysicalKey) -> MirrorOutcome {
        let target = key.as_str().to_string();
        self.run_bounded("delete", key, move |store| match store.stat(&target) {
            Ok(_) => {
                store.delete(&target)?;
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        })
    }

    fn run_bounded<F>(&self, op: &'static str, key: &PhysicalKey, f: F) -> MirrorOutcome
    where
        F: FnOnce(&dyn ObjectStore) -> StoreResult<bool> + Send + 'static,
    {
        let (reply, rx) = channel::bounded(1);
        let job = Job {
            call: Box::new(f),
            reply,
        };

        match self.jobs.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Mirror {} of {} dropped, worker queue full", op, key);
                return MirrorOutcome::Dropped;
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Mirror {} of {} not started, worker gone", op, key);
                return MirrorOutcome::Failed;
            }
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(true)) => {
                debug!("Mirrored {} of {}", op, key);
                MirrorOutcome::Applied
            }
            Ok(Ok(false)) => {
                debug!("Mirror {} of {} skipped: not present", op, key);
                MirrorOutcome::Skipped
            }
            Ok(Err(e)) => {
                warn!("Mirror {} of {} failed: {}", op, key, e);
                MirrorOutcome::Failed
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Mirror {} of {} exceeded {:?}, continuing without it",
                    op, key, self.timeout
                );
                MirrorOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Mirror {} of {} aborted", op, key);
                MirrorOutcome::Failed
            }
        }
    }
}

/// Worker loop; ends once the writer is dropped and the queue is empty
fn drain(store: Arc<dyn ObjectStore>, queue: Receiver<Job>) {
    for job in queue.iter() {
        let result = (job.call)(store.as_ref());
        // caller may have stopped waiting
        let _ = job.reply.send(result);
    }
}
