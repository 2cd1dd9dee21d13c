//! Checksum Agent - Main entry point
//!
//! Runs every configured check group once, delivers one report per group and
//! exits after pending snapshot writes have been flushed.

use anyhow::Result;
use checksum_agent::config::{CheckGroup, Config};
use checksum_agent::digest::ChecksumEngine;
use checksum_agent::executor::JobRunner;
use checksum_agent::report::{self, DirectoryOutbox};
use checksum_agent::snapshot::SnapshotStore;
use checksum_agent::utils;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "checksum-agent.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Outbox directory for reports (overrides config)
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)?;
    if let Some(out_dir) = args.out_dir {
        config.report.out_dir = Some(out_dir);
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, &config.log.output)?;

    tracing::info!(
        "Starting checksum-agent v{} (algorithm: {}, groups: {})",
        env!("CARGO_PKG_VERSION"),
        config.checksum.algorithm,
        config.checks.len()
    );

    let runner = JobRunner::new(
        ChecksumEngine::new(config.checksum.algorithm),
        SnapshotStore::new(&config.snapshot.dir),
        config.snapshot.on_corrupt,
        config.max_concurrent_jobs(),
    );
    let outbox = config.report.out_dir.as_ref().map(DirectoryOutbox::new);

    for group in &config.checks {
        run_group(&config, &runner, outbox.as_ref(), group).await;
    }

    // Wait for snapshot writes (with timeout)
    let flush_timeout = Duration::from_secs(config.snapshot.flush_timeout_secs);
    let summary = runner.writer().flush(flush_timeout).await;
    tracing::info!(
        written = summary.written,
        failed = summary.failed.len(),
        pending = summary.pending,
        "Snapshot writes flushed"
    );

    Ok(())
}

/// Check one group and deliver its report. Failures are logged, never fatal.
async fn run_group(
    config: &Config,
    runner: &JobRunner,
    outbox: Option<&DirectoryOutbox>,
    group: &CheckGroup,
) {
    let results = runner.run(&group.apps).await;

    let message = match report::compose(
        &group.mail,
        config.checksum.algorithm,
        &results,
        config.report.compression,
        chrono::Local::now(),
    ) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!("Failed to compose report: {}", e);
            return;
        }
    };

    match outbox {
        Some(outbox) => {
            if let Err(e) = outbox.deliver(&message) {
                tracing::error!(subject = %message.subject, "Report delivery failed: {}", e);
            }
        }
        None => println!("{}", message.to_text()),
    }
}
