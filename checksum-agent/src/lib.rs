//! Checksum Agent Library
//!
//! Walks monitored directory trees, digests every matching file, diffs the
//! result against the previous run's snapshot and composes a report per
//! check group.

pub mod config;
pub mod diff;
pub mod digest;
pub mod executor;
pub mod fs;
pub mod report;
pub mod snapshot;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::MonitorError;
pub type Result<T> = std::result::Result<T, MonitorError>;
