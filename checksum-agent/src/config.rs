//! Configuration management for the checksum agent.
//!
//! Loads configuration from a TOML (or JSON) file with environment variable
//! overrides, e.g. `CHECKSUM_AGENT_LOG__LEVEL=debug`.

use crate::digest::HashAlgorithm;
use crate::executor::AppJob;
use crate::report::Compression;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CHECKSUM_AGENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checksum: ChecksumConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Check groups, each reported as one message
    #[serde(default)]
    pub checks: Vec<CheckGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// Digest algorithm for every file in the run
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory holding one `<app_name>.json` per diff-enabled job
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,

    /// What to do when a snapshot exists but cannot be parsed
    #[serde(default)]
    pub on_corrupt: CorruptSnapshotPolicy,

    /// Upper bound on waiting for snapshot writes before exit
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptSnapshotPolicy {
    /// Fail the job and leave the file alone
    #[default]
    Fail,

    /// Warn, treat the snapshot as absent and overwrite it
    Rebaseline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Outbox directory; reports go to stdout when unset
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Attachment compression (none, gzip, zstd)
    #[serde(default)]
    pub compression: Compression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output (stdout, stderr)
    #[serde(default = "default_log_output")]
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum jobs checked at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

/// A set of jobs reported together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckGroup {
    pub mail: MailConfig,

    #[serde(default)]
    pub apps: Vec<AppJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub subject: Option<String>,

    #[serde(alias = "mailFrom", alias = "mailfrom")]
    pub from: String,

    #[serde(default)]
    pub recipients: Vec<String>,
}

// Default values
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("./snapshot")
}

fn default_flush_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stderr".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    1
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            on_corrupt: CorruptSnapshotPolicy::default(),
            flush_timeout_secs: default_flush_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl Config {
    /// Load configuration from a file (format picked by extension), then
    /// apply `CHECKSUM_AGENT_*` environment overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Concurrency limit, never below one.
    pub fn max_concurrent_jobs(&self) -> usize {
        self.performance.max_concurrent_jobs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [checksum]
        algorithm = "md5"

        [snapshot]
        dir = "/var/lib/checksum-agent/snapshot"
        on_corrupt = "rebaseline"

        [report]
        compression = "zstd"

        [[checks]]
        [checks.mail]
        subject = "Nightly checksums"
        from = "monitor@example.com"
        recipients = ["ops@example.com", "sec@example.com"]

        [[checks.apps]]
        start_path = "/srv/shop"
        app_name = "shop"
        reg_exp = "\\.(js|json)$"
        diff = true

        [[checks.apps]]
        startPath = "/srv/blog"
        appName = "blog"
        regExp = ".*"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.checksum.algorithm, HashAlgorithm::Md5);
        assert_eq!(config.snapshot.dir, PathBuf::from("/var/lib/checksum-agent/snapshot"));
        assert_eq!(config.snapshot.on_corrupt, CorruptSnapshotPolicy::Rebaseline);
        assert_eq!(config.snapshot.flush_timeout_secs, 10);
        assert_eq!(config.report.compression, Compression::Zstd);
        assert!(config.report.out_dir.is_none());

        assert_eq!(config.checks.len(), 1);
        let group = &config.checks[0];
        assert_eq!(group.mail.subject.as_deref(), Some("Nightly checksums"));
        assert_eq!(group.mail.recipients.len(), 2);

        assert_eq!(group.apps.len(), 2);
        assert_eq!(group.apps[0].name, "shop");
        assert_eq!(group.apps[0].filter, "\\.(js|json)$");
        assert!(group.apps[0].diff);

        // camelCase keys from older config files are accepted
        assert_eq!(group.apps[1].name, "blog");
        assert_eq!(group.apps[1].root, PathBuf::from("/srv/blog"));
        assert!(!group.apps[1].diff);
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.checksum.algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.snapshot.dir, PathBuf::from("./snapshot"));
        assert_eq!(config.snapshot.on_corrupt, CorruptSnapshotPolicy::Fail);
        assert_eq!(config.report.compression, Compression::Gzip);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.output, "stderr");
        assert_eq!(config.max_concurrent_jobs(), 1);
        assert!(config.checks.is_empty());
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let result = Config::from_toml_str("[checksum]\nalgorithm = \"crc32\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("checksum-agent.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.checks[0].apps[0].name, "shop");
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("checksum-agent.toml");
        std::fs::write(&path, "[log]\nlevel = \"info\"\n").unwrap();

        std::env::set_var("CHECKSUM_AGENT_LOG__LEVEL", "debug");
        let config = Config::from_file(&path);
        std::env::remove_var("CHECKSUM_AGENT_LOG__LEVEL");

        assert_eq!(config.unwrap().log.level, "debug");
    }
}
