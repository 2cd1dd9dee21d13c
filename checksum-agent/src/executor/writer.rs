//! Background snapshot writes.
//!
//! Jobs hand their digest map to the writer and move on. The caller decides
//! when (and for how long) to wait for the writes with [`SnapshotWriter::flush`].

use crate::snapshot::{DigestMap, SnapshotStore};
use crate::utils::{MonitorError, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

type WriteOutcome = (String, Result<PathBuf>);

/// Outcome of waiting for pending snapshot writes.
#[derive(Debug, Default)]
pub struct FlushSummary {
    pub written: usize,
    pub failed: Vec<(String, MonitorError)>,
    /// Writes still running when the timeout expired
    pub pending: usize,
}

impl FlushSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.pending == 0
    }
}

pub struct SnapshotWriter {
    store: SnapshotStore,
    tasks: Mutex<JoinSet<WriteOutcome>>,
}

impl SnapshotWriter {
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            store,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue a snapshot write on the blocking pool. Must be called from
    /// inside a tokio runtime.
    pub fn spawn_save(&self, name: String, digests: DigestMap) {
        let store = self.store.clone();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        tasks.spawn_blocking(move || {
            let outcome = store.save(&name, &digests);
            (name, outcome)
        });
    }

    /// Number of writes queued and not yet collected.
    pub fn queued(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait up to `timeout` for queued writes. Failures are logged and
    /// returned; writes that outlive the timeout are counted as pending.
    pub async fn flush(&self, timeout: Duration) -> FlushSummary {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };

        let mut summary = FlushSummary::default();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((name, Ok(path))) => {
                        debug!(app = %name, path = %path.display(), "Snapshot written");
                        summary.written += 1;
                    }
                    Ok((name, Err(e))) => {
                        error!(app = %name, error = %e, "Snapshot write failed");
                        summary.failed.push((name, e));
                    }
                    Err(e) => {
                        error!(error = %e, "Snapshot write task panicked");
                        summary
                            .failed
                            .push(("<unknown>".to_string(), MonitorError::JobAborted(e.to_string())));
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            summary.pending = tasks.len();
            warn!(
                pending = summary.pending,
                "Timed out waiting for snapshot writes; the next run may treat these jobs as new"
            );
            // Blocking writes cannot be cancelled; detaching lets them finish
            // while the runtime shuts down.
            tasks.detach_all();
        }

        summary
    }
}
