//! Directory outbox.
//!
//! Each delivered report gets its own directory holding `message.txt` and
//! the attachments, for a mail relay to pick up.

use super::ReportMessage;
use crate::utils::{MonitorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MESSAGE_FILE: &str = "message.txt";

#[derive(Debug, Clone)]
pub struct DirectoryOutbox {
    dir: PathBuf,
}

impl DirectoryOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `message` into a fresh directory and return its path.
    pub fn deliver(&self, message: &ReportMessage) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| delivery(&self.dir, e))?;

        let stem = format!(
            "{}-{}",
            message.created.format("%Y%m%d-%H%M%S"),
            slug(&message.subject)
        );
        let target = self.reserve(&stem)?;

        fs::write(target.join(MESSAGE_FILE), message.to_text())
            .map_err(|e| delivery(&target, e))?;

        for attachment in &message.attachments {
            // Attachment names come from validated job names
            let path = target.join(&attachment.filename);
            fs::write(&path, &attachment.content).map_err(|e| delivery(&path, e))?;
        }

        info!(
            subject = %message.subject,
            attachments = message.attachments.len(),
            path = %target.display(),
            "Report delivered to outbox"
        );
        Ok(target)
    }

    /// Create a directory named `stem`, or `stem-N` if taken.
    fn reserve(&self, stem: &str) -> Result<PathBuf> {
        let mut suffix = 0;
        loop {
            let name = if suffix == 0 {
                stem.to_string()
            } else {
                format!("{}-{}", stem, suffix)
            };
            let candidate = self.dir.join(name);

            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(delivery(&candidate, e)),
            }
        }
    }
}

fn delivery(path: &Path, e: std::io::Error) -> MonitorError {
    MonitorError::Delivery(format!("{}: {}", path.display(), e))
}

/// Lowercase ASCII alphanumerics joined by single dashes.
fn slug(subject: &str) -> String {
    let mut out = String::new();
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Attachment;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn message(subject: &str) -> ReportMessage {
        ReportMessage {
            from: "monitor@example.com".to_string(),
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: subject.to_string(),
            body: "algorithm: sha256\r\n".to_string(),
            attachments: vec![Attachment {
                filename: "shop.txt".to_string(),
                content: b"[]".to_vec(),
                content_type: "text/plain",
            }],
            created: Local.with_ymd_and_hms(2024, 3, 1, 8, 5, 9).single().unwrap(),
        }
    }

    #[test]
    fn test_deliver_writes_message_and_attachments() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = DirectoryOutbox::new(temp_dir.path().join("outbox"));

        let dir = outbox.deliver(&message("Nightly checksums!")).unwrap();
        assert_eq!(dir.file_name().unwrap(), "20240301-080509-nightly-checksums");

        let text = fs::read_to_string(dir.join("message.txt")).unwrap();
        assert!(text.starts_with("From: monitor@example.com\r\nTo: a@example.com, b@example.com\r\n"));
        assert!(text.ends_with("\r\n\r\nalgorithm: sha256\r\n"));
        assert_eq!(fs::read(dir.join("shop.txt")).unwrap(), b"[]");
    }

    #[test]
    fn test_same_second_gets_a_new_directory() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = DirectoryOutbox::new(temp_dir.path());

        let first = outbox.deliver(&message("r")).unwrap();
        let second = outbox.deliver(&message("r")).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-r-1"));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Checksum report: shop"), "checksum-report-shop");
        assert_eq!(slug("  --  "), "report");
        assert_eq!(slug("Ünïcode"), "n-code");
    }
}
