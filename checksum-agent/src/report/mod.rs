//! Report composition.
//!
//! One check group becomes one [`ReportMessage`]: a CRLF text body that
//! summarises every job, plus one attachment per successful job holding its
//! digest listing.

pub mod compress;
pub mod outbox;

pub use compress::Compression;
pub use outbox::DirectoryOutbox;

use crate::config::MailConfig;
use crate::digest::{ChecksumEngine, HashAlgorithm};
use crate::executor::{CheckResult, DiffStatus, JobOutcome};
use crate::utils::Result;
use chrono::{DateTime, Local};

const CRLF: &str = "\r\n";
const SEPARATOR_WIDTH: usize = 122;
const DEFAULT_SUBJECT: &str = "no subject";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct ReportMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub created: DateTime<Local>,
}

impl ReportMessage {
    /// Headers, a blank line, then the body.
    pub fn to_text(&self) -> String {
        let mut text = CrlfText::default();
        text.line(format!("From: {}", self.from));
        text.line(format!("To: {}", self.to.join(", ")));
        text.line(format!("Subject: {}", self.subject));
        text.blank();

        let mut text = text.into_string();
        text.push_str(&self.body);
        text
    }
}

/// Build the report for one check group.
///
/// Attachments are compressed with `compression`; the body lists the digest
/// of each attachment's final bytes under `algorithm`.
pub fn compose(
    mail: &MailConfig,
    algorithm: HashAlgorithm,
    results: &[CheckResult],
    compression: Compression,
    timestamp: DateTime<Local>,
) -> Result<ReportMessage> {
    let engine = ChecksumEngine::new(algorithm);
    let mut body = CrlfText::default();
    let mut attachments = Vec::new();

    body.line(format!("algorithm: {}", algorithm));
    body.line(format!(
        "execution timestamp: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    body.line(format!("host: {}", local_hostname()));

    for result in results {
        body.blank();
        body.line("-".repeat(SEPARATOR_WIDTH));

        let report = match &result.outcome {
            JobOutcome::Checked(report) => report,
            JobOutcome::Failed(e) => {
                body.line(format!("{}: Check failed: {}", result.app_name, e));
                continue;
            }
        };

        let listing = report.digests.sorted().to_json_pretty()?;
        let attachment = Attachment {
            filename: compression.file_name(&format!("{}.txt", result.app_name)),
            content: compression.compress(listing.as_bytes())?,
            content_type: compression.content_type(),
        };

        body.line(format!(
            "{}: {}",
            attachment.filename,
            engine.digest(&attachment.content)
        ));
        attachments.push(attachment);

        if report.root_missing {
            body.line(format!("Directory not found: {}", result.root.display()));
        }

        match &report.diff {
            Some(DiffStatus::SnapshotCreated) => {
                body.blank();
                body.line("Snapshot has been created");
            }
            Some(DiffStatus::Compared(diff)) => {
                let diff = diff.clone().sorted();
                body.blank();
                body.line(format!("Files matched count : {}", diff.matched_count));
                body.list("New files", &diff.new_files);
                body.list("Modified files", &diff.modified_files);
                body.list("Removed files", &diff.removed_files);
            }
            None => {}
        }
    }

    Ok(ReportMessage {
        from: mail.from.clone(),
        to: mail.recipients.clone(),
        subject: mail
            .subject
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        body: body.into_string(),
        attachments,
        created: timestamp,
    })
}

/// Text built from CRLF-terminated lines.
#[derive(Default)]
struct CrlfText(String);

impl CrlfText {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push_str(CRLF);
    }

    fn blank(&mut self) {
        self.0.push_str(CRLF);
    }

    /// Blank line, `title :`, then one two-space indented line per path.
    fn list(&mut self, title: &str, paths: &[String]) {
        self.blank();
        self.line(format!("{} :", title));
        for path in paths {
            self.line(format!("  {}", path));
        }
    }

    fn into_string(self) -> String {
        self.0
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
