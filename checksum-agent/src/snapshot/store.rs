//! Snapshot persistence.
//!
//! Each diff-enabled job owns `<dir>/<name>.json`: a pretty-printed JSON list
//! of `[path, digest]` pairs in the order they were recorded.

use super::digest_map::DigestMap;
use crate::utils::{MonitorError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SNAPSHOT_EXTENSION: &str = "json";

/// Directory of named snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the snapshot called `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)))
    }

    /// Load a snapshot. `Ok(None)` means no snapshot exists yet; a file that
    /// exists but cannot be read or parsed is an error.
    pub fn load(&self, name: &str) -> Result<Option<DigestMap>> {
        let path = self.path_for(name)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(MonitorError::SnapshotRead { path, source }),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| MonitorError::SnapshotCorrupt {
                path,
                reason: e.to_string(),
            })
    }

    /// Write a snapshot, creating the directory if needed. The content goes to
    /// a temporary file first and is renamed over the old snapshot.
    pub fn save(&self, name: &str, digests: &DigestMap) -> Result<PathBuf> {
        let path = self.path_for(name)?;

        fs::create_dir_all(&self.dir).map_err(|source| MonitorError::SnapshotWrite {
            path: self.dir.clone(),
            source,
        })?;

        let json = digests.to_json_pretty()?;
        let tmp_path = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));

        fs::write(&tmp_path, json).map_err(|source| MonitorError::SnapshotWrite {
            path: tmp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(MonitorError::SnapshotWrite { path, source });
        }

        Ok(path)
    }
}

/// Snapshot names become file stems, so they must be plain file names.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(MonitorError::InvalidJobName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> DigestMap {
        let mut map = DigestMap::new();
        map.insert("b.txt", "2222");
        map.insert("a.txt", "1111");
        map
    }

    #[test]
    fn test_load_absent_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path().join("snapshot"));
        assert!(store.load("app")?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_creates_directory_and_round_trips() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path().join("nested/snapshot"));

        let path = store.save("app", &sample())?;
        assert_eq!(path, temp_dir.path().join("nested/snapshot/app.json"));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = store.load("app")?.expect("snapshot should exist");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("a.txt"), Some("1111"));

        // Order on disk is the order the map was built in
        let first = loaded.iter().next().unwrap();
        assert_eq!(first, ("b.txt", "2222"));
        Ok(())
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path());

        store.save("app", &sample())?;
        let mut next = DigestMap::new();
        next.insert("c.txt", "3333");
        store.save("app", &next)?;

        let loaded = store.load("app")?.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("c.txt"), Some("3333"));
        Ok(())
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path());
        std::fs::write(temp_dir.path().join("app.json"), "{ not json")?;

        let err = store.load("app").unwrap_err();
        assert!(matches!(err, MonitorError::SnapshotCorrupt { .. }));
        Ok(())
    }

    #[test]
    fn test_duplicate_keys_are_corruption() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path());
        std::fs::write(
            temp_dir.path().join("app.json"),
            r#"[["a.txt", "1"], ["a.txt", "2"]]"#,
        )?;

        let err = store.load("app").unwrap_err();
        match err {
            MonitorError::SnapshotCorrupt { reason, .. } => assert!(reason.contains("duplicate")),
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_unreadable_snapshot_is_a_read_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SnapshotStore::new(temp_dir.path());
        // A directory where the snapshot file should be
        std::fs::create_dir(temp_dir.path().join("app.json"))?;

        let err = store.load("app").unwrap_err();
        assert!(matches!(err, MonitorError::SnapshotRead { .. }));
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_names() {
        for name in ["", " ", ".", "..", "a/b", "..\\up"] {
            assert!(validate_name(name).is_err(), "{name:?} should be rejected");
        }
        assert!(validate_name("billing-api").is_ok());
    }
}
