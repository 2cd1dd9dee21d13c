//! Classification of two digest maps.

use crate::snapshot::DigestMap;
use serde::Serialize;

/// Result of comparing a previous digest map against the current one.
///
/// Every path of the previous map lands in exactly one of matched, modified
/// or removed; every path of the current map in exactly one of matched,
/// modified or new. Lists follow the iteration order of the map they came
/// from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub matched_count: usize,
    pub new_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub removed_files: Vec<String>,
}

impl DiffResult {
    /// True when nothing was added, modified or removed.
    pub fn is_clean(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.removed_files.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len() + self.removed_files.len()
    }

    /// Same result with every list sorted by path.
    pub fn sorted(mut self) -> Self {
        self.new_files.sort();
        self.modified_files.sort();
        self.removed_files.sort();
        self
    }
}

/// Compare `previous` against `current`.
pub fn compare(previous: &DigestMap, current: &DigestMap) -> DiffResult {
    let mut result = DiffResult::default();

    for (path, digest) in previous.iter() {
        match current.get(path) {
            Some(now) if now == digest => result.matched_count += 1,
            Some(_) => result.modified_files.push(path.to_string()),
            None => result.removed_files.push(path.to_string()),
        }
    }

    result.new_files = current
        .iter()
        .filter(|(path, _)| !previous.contains(path))
        .map(|(path, _)| path.to_string())
        .collect();

    result
}
