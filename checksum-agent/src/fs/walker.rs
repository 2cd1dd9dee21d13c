//! Directory traversal for checksum jobs.
//!
//! Entries are visited in the order the filesystem returns them. Nothing is
//! sorted here; callers that need stable output sort afterwards. Symbolic
//! links are never descended into, even when they point at a directory.

use crate::utils::{MonitorError, Result};
use regex::Regex;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// What a visited leaf entry is, judged without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,

    /// Symbolic link, with what its target resolves to
    Symlink(LinkTarget),

    /// FIFO, socket, device node
    Other,
}

/// What a symbolic link resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    File,
    Directory,
    Dangling,
    Other,
}

/// A leaf entry that matched the path filter.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Full path (root joined with the relative part)
    pub path: PathBuf,

    /// Relative path from the root, `/`-separated on every platform
    pub relative_path: String,

    pub kind: EntryKind,
}

impl WalkEntry {
    fn from_entry(entry: &DirEntry, root: &Path) -> Self {
        let path = entry.path().to_path_buf();
        let relative_path = posix_relative(&path, root);
        let file_type = entry.file_type();

        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            // fs::metadata follows the link
            let target = match std::fs::metadata(&path) {
                Ok(m) if m.is_file() => LinkTarget::File,
                Ok(m) if m.is_dir() => LinkTarget::Directory,
                Ok(_) => LinkTarget::Other,
                Err(_) => LinkTarget::Dangling,
            };
            EntryKind::Symlink(target)
        } else {
            EntryKind::Other
        };

        Self {
            path,
            relative_path,
            kind,
        }
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// The root existed and was traversed; `visited` entries matched the filter.
    Walked { visited: usize },

    /// The root does not exist. Nothing was traversed.
    MissingRoot,
}

/// Walk `root`, calling `visit` for every non-directory entry whose full path
/// matches `filter`.
///
/// A missing root is logged and reported as [`WalkStatus::MissingRoot`], not
/// as an error. A root that exists but is not a directory is an error.
/// Errors from the filesystem and from `visit` stop the walk and propagate.
///
/// # Example
/// ```no_run
/// use checksum_agent::fs::walker::walk;
/// use regex::Regex;
/// use std::path::Path;
///
/// let filter = Regex::new(r"\.js$").unwrap();
/// let mut count = 0;
/// walk(Path::new("/srv/app"), &filter, |_entry| {
///     count += 1;
///     Ok(())
/// })
/// .unwrap();
/// println!("Found {} files", count);
/// ```
pub fn walk<F>(root: &Path, filter: &Regex, mut visit: F) -> Result<WalkStatus>
where
    F: FnMut(&WalkEntry) -> Result<()>,
{
    match std::fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Err(MonitorError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("no such directory: {}", root.display());
            return Ok(WalkStatus::MissingRoot);
        }
        Err(e) => return Err(MonitorError::read_file(root, e)),
    }

    // walkdir keeps its own stack of open directories, so deep trees do not
    // grow the call stack. The root itself is followed if it is a link.
    let walker = WalkDir::new(root).follow_links(false).min_depth(1);
    let filter_base = normalize_root(root);

    let mut visited = 0;
    for entry in walker {
        let entry = entry.map_err(|e| MonitorError::Traverse {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: e,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !filter.is_match(&filter_base.join(relative).to_string_lossy()) {
            continue;
        }

        let walk_entry = WalkEntry::from_entry(&entry, root);
        debug!(path = %walk_entry.relative_path, kind = ?walk_entry.kind, "visit");
        visit(&walk_entry)?;
        visited += 1;
    }

    Ok(WalkStatus::Walked { visited })
}

/// `root` without `.` components, so `./app` is matched as `app/...`.
fn normalize_root(root: &Path) -> PathBuf {
    root.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Relative path of `path` under `root`, joined with `/`.
fn posix_relative(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
