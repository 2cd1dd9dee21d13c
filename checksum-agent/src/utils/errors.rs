//! Custom error types for the checksum agent.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid path filter for {app}: {source}")]
    InvalidFilter {
        app: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid job name {0:?}: must be a plain file name")]
    InvalidJobName(String),

    #[error("Snapshot name {0:?} is already used by another job in this run")]
    DuplicateSnapshotName(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to traverse {}: {source}", path.display())]
    Traverse {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{} shares the entry {key:?} with another file", path.display())]
    PathCollision { path: PathBuf, key: String },

    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read snapshot {}: {source}", path.display())]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt snapshot {}: {reason}", path.display())]
    SnapshotCorrupt { path: PathBuf, reason: String },

    #[error("Failed to write snapshot {}: {source}", path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Report delivery failed: {0}")]
    Delivery(String),

    #[error("Job aborted: {0}")]
    JobAborted(String),
}

impl MonitorError {
    /// Attach the offending path to an I/O error raised while reading a file.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::ReadFile {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
