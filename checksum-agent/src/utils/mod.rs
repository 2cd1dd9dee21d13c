//! Utility modules for the checksum agent.

pub mod errors;
pub mod logger;

pub use errors::{MonitorError, Result};
