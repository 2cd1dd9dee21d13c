//! Checksum job executor - Orchestrates one pass over the configured jobs.
//!
//! For each job this ties together:
//! - File system walker
//! - Checksum engine
//! - Snapshot load and diff
//! - Background snapshot write
//!
//! Each job is its own failure boundary: an error ends that job with a
//! [`JobOutcome::Failed`] marker and the others carry on.

pub mod writer;

use crate::config::CorruptSnapshotPolicy;
use crate::diff::{compare, DiffResult};
use crate::digest::ChecksumEngine;
use crate::fs::walker::{walk, EntryKind, LinkTarget, WalkEntry, WalkStatus};
use crate::snapshot::store::validate_name;
use crate::snapshot::{DigestMap, SnapshotStore};
use crate::utils::{MonitorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use writer::SnapshotWriter;

/// One monitored directory tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppJob {
    /// Root directory to walk
    #[serde(rename = "start_path", alias = "startPath", alias = "startpath")]
    pub root: PathBuf,

    /// Report label and snapshot file stem
    #[serde(rename = "app_name", alias = "appName", alias = "appname")]
    pub name: String,

    /// Regular expression matched against each file's full path
    #[serde(rename = "reg_exp", alias = "regExp", alias = "regexp")]
    pub filter: String,

    /// Compare against and update the stored snapshot
    #[serde(default)]
    pub diff: bool,
}

/// What diffing produced for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffStatus {
    /// No snapshot existed; the current map becomes the first one.
    SnapshotCreated,

    Compared(DiffResult),
}

/// Output of a job that ran to completion.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub digests: DigestMap,

    /// The root directory did not exist; `digests` is empty.
    pub root_missing: bool,

    /// `None` when diffing is disabled for the job
    pub diff: Option<DiffStatus>,
}

#[derive(Debug)]
pub enum JobOutcome {
    Checked(JobReport),
    Failed(MonitorError),
}

/// Per-job result handed to the report layer.
#[derive(Debug)]
pub struct CheckResult {
    pub app_name: String,
    pub root: PathBuf,
    pub outcome: JobOutcome,
}

impl CheckResult {
    fn failed(job: &AppJob, error: MonitorError) -> Self {
        Self {
            app_name: job.name.clone(),
            root: job.root.clone(),
            outcome: JobOutcome::Failed(error),
        }
    }

    pub fn report(&self) -> Option<&JobReport> {
        match &self.outcome {
            JobOutcome::Checked(report) => Some(report),
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&MonitorError> {
        match &self.outcome {
            JobOutcome::Checked(_) => None,
            JobOutcome::Failed(e) => Some(e),
        }
    }
}

/// Runs checksum jobs and queues their snapshot writes.
///
/// Snapshot names are claimed for the lifetime of the runner, so two
/// diff-enabled jobs can never write the same file in one invocation.
pub struct JobRunner {
    engine: ChecksumEngine,
    store: SnapshotStore,
    writer: SnapshotWriter,
    on_corrupt: CorruptSnapshotPolicy,
    limit: Arc<Semaphore>,
    claimed: Mutex<HashSet<String>>,
}

impl JobRunner {
    pub fn new(
        engine: ChecksumEngine,
        store: SnapshotStore,
        on_corrupt: CorruptSnapshotPolicy,
        max_concurrent_jobs: usize,
    ) -> Self {
        let algorithm = engine.algorithm();
        if algorithm.is_legacy() {
            warn!(
                "{} is not collision resistant; use it only to compare against snapshots written with it",
                algorithm
            );
        }

        Self {
            engine,
            writer: SnapshotWriter::new(store.clone()),
            store,
            on_corrupt,
            limit: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn engine(&self) -> ChecksumEngine {
        self.engine
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Check every job and return one result per job, in input order.
    ///
    /// Snapshot writes are queued, not awaited; see [`SnapshotWriter::flush`].
    pub async fn run(&self, jobs: &[AppJob]) -> Vec<CheckResult> {
        let mut slots: Vec<Option<CheckResult>> = jobs.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (position, job) in jobs.iter().enumerate() {
            if let Err(e) = self.claim(job) {
                error!(app = %job.name, error = %e, "Check rejected");
                slots[position] = Some(CheckResult::failed(job, e));
                continue;
            }

            let job = job.clone();
            let engine = self.engine;
            let store = self.store.clone();
            let on_corrupt = self.on_corrupt;
            let limit = Arc::clone(&self.limit);

            tasks.spawn(async move {
                let _permit = match limit.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let e = MonitorError::JobAborted("job limiter closed".to_string());
                        return (position, job, Err(e));
                    }
                };

                let blocking_job = job.clone();
                let checked = tokio::task::spawn_blocking(move || {
                    check_job(&blocking_job, engine, &store, on_corrupt)
                })
                .await
                .unwrap_or_else(|e| Err(MonitorError::JobAborted(e.to_string())));

                (position, job, checked)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (position, job, checked) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Check task failed to complete");
                    continue;
                }
            };

            let outcome = match checked {
                Ok(checked) => {
                    log_report(&job, &checked.report);
                    if checked.save {
                        self.writer
                            .spawn_save(job.name.clone(), checked.report.digests.clone());
                    }
                    JobOutcome::Checked(checked.report)
                }
                Err(e) => {
                    error!(app = %job.name, root = %job.root.display(), error = %e, "Check failed");
                    JobOutcome::Failed(e)
                }
            };

            slots[position] = Some(CheckResult {
                app_name: job.name,
                root: job.root,
                outcome,
            });
        }

        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    CheckResult::failed(job, MonitorError::JobAborted("check did not finish".to_string()))
                })
            })
            .collect()
    }

    /// Validate the job name and reserve its snapshot.
    fn claim(&self, job: &AppJob) -> Result<()> {
        validate_name(&job.name)?;

        if !job.diff {
            return Ok(());
        }

        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(job.name.clone()) {
            return Err(MonitorError::DuplicateSnapshotName(job.name.clone()));
        }
        Ok(())
    }
}

struct Checked {
    report: JobReport,
    /// Persist `report.digests` as the job's new snapshot
    save: bool,
}

/// Walk, hash and (optionally) diff one job. Blocking.
fn check_job(
    job: &AppJob,
    engine: ChecksumEngine,
    store: &SnapshotStore,
    on_corrupt: CorruptSnapshotPolicy,
) -> Result<Checked> {
    let filter = Regex::new(&job.filter).map_err(|source| MonitorError::InvalidFilter {
        app: job.name.clone(),
        source,
    })?;

    let mut digests = DigestMap::new();
    let status = walk(&job.root, &filter, |entry| {
        if let Some(digest) = digest_entry(&engine, entry)? {
            // Non-UTF-8 names are keyed lossily and may collide
            if digests.insert(entry.relative_path.clone(), digest).is_some() {
                return Err(MonitorError::PathCollision {
                    path: entry.path.clone(),
                    key: entry.relative_path.clone(),
                });
            }
        }
        Ok(())
    })?;

    let root_missing = status == WalkStatus::MissingRoot;

    if !job.diff {
        return Ok(Checked {
            report: JobReport {
                digests,
                root_missing,
                diff: None,
            },
            save: false,
        });
    }

    let previous = match store.load(&job.name) {
        Ok(previous) => previous,
        Err(e @ MonitorError::SnapshotCorrupt { .. })
            if on_corrupt == CorruptSnapshotPolicy::Rebaseline =>
        {
            warn!(app = %job.name, error = %e, "Discarding corrupt snapshot and starting a new baseline");
            None
        }
        Err(e) => return Err(e),
    };

    let diff = match previous {
        None => DiffStatus::SnapshotCreated,
        Some(previous) => {
            let expected = engine.algorithm().hex_len();
            if previous.iter().any(|(_, digest)| digest.len() != expected) {
                warn!(
                    app = %job.name,
                    algorithm = %engine.algorithm(),
                    "Snapshot digests do not match the configured algorithm; every file will show as modified"
                );
            }
            DiffStatus::Compared(compare(&previous, &digests))
        }
    };

    Ok(Checked {
        report: JobReport {
            digests,
            root_missing,
            diff: Some(diff),
        },
        save: true,
    })
}

/// Digest one walked entry.
///
/// Files and links to files are digested by content. Links to directories
/// and dangling links are opaque leaves digested by their target text.
/// Special files are skipped.
fn digest_entry(engine: &ChecksumEngine, entry: &WalkEntry) -> Result<Option<String>> {
    match entry.kind {
        EntryKind::File | EntryKind::Symlink(LinkTarget::File) => {
            let file = File::open(&entry.path).map_err(|e| MonitorError::read_file(&entry.path, e))?;
            let digest = engine
                .digest_reader(file)
                .map_err(|e| MonitorError::read_file(&entry.path, e))?;
            Ok(Some(digest))
        }
        EntryKind::Symlink(LinkTarget::Directory | LinkTarget::Dangling) => {
            let target = std::fs::read_link(&entry.path)
                .map_err(|e| MonitorError::read_file(&entry.path, e))?;
            Ok(Some(engine.digest(target.to_string_lossy().as_bytes())))
        }
        EntryKind::Symlink(LinkTarget::Other) | EntryKind::Other => {
            warn!(path = %entry.path.display(), "Skipping special file");
            Ok(None)
        }
    }
}

fn log_report(job: &AppJob, report: &JobReport) {
    match &report.diff {
        Some(DiffStatus::Compared(diff)) => info!(
            app = %job.name,
            files = report.digests.len(),
            matched = diff.matched_count,
            new = diff.new_files.len(),
            modified = diff.modified_files.len(),
            removed = diff.removed_files.len(),
            "Check complete"
        ),
        Some(DiffStatus::SnapshotCreated) => info!(
            app = %job.name,
            files = report.digests.len(),
            "Check complete, snapshot created"
        ),
        None => info!(app = %job.name, files = report.digests.len(), "Check complete"),
    }
}
