//! File system traversal.

pub mod walker;

pub use walker::{walk, EntryKind, LinkTarget, WalkEntry, WalkStatus};
