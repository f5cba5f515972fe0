//! One scan cycle over the watch directory.
//!
//! Categories are handled strictly in order: results, events, usage. A file
//! that fails to read, parse or send is counted as failed and left unmarked,
//! so the next cycle picks it up again. A file modified within the settle
//! window is assumed to be still open for writing and is left unmarked too.
//! Only a missing watch directory ends the cycle early.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, FixedOffset, Local, Utc};
use neolink_client::{SyncClient, Transport};
use neolink_core::{config::DEFAULT_SETTLE_SECS, AgentConfig, SerialNumber};
use neolink_reports::{
    classify::ReportCategory,
    demo::{demo_metrics_report, demo_result_report, DEMO_SERIAL},
    events::{build_log_file, resolve_log_serial},
    results::parse_result_report,
    serial_from_file_name,
    usage::parse_usage_report,
    ParseContext, ParseError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{io_err, ScanError};
use crate::ledger::{Ledger, LedgerSizes};

/// Scanner inputs taken from the agent configuration.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub directory: PathBuf,
    /// Static instrument serial, if configured.
    pub serial_number: Option<SerialNumber>,
    pub synthetic_mode: bool,
    pub assay_success_rates: bool,
    /// Minimum age of a file's last modification before it is read.
    pub settle_window: Duration,
}

impl ScanSettings {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            serial_number: None,
            synthetic_mode: false,
            assay_success_rates: true,
            settle_window: Duration::from_secs(DEFAULT_SETTLE_SECS),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            directory: config.directory_to_scan.clone(),
            serial_number: config.serial_number.as_deref().map(SerialNumber::from),
            synthetic_mode: config.synthetic_mode,
            assay_success_rates: config.assay_success_rates,
            settle_window: Duration::from_secs(config.settle_secs),
        }
    }
}

/// Per-category outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Sent and marked this cycle.
    pub processed: usize,
    /// Read, parse or send failed; retried next cycle.
    pub failed: usize,
    /// Already in the ledger.
    pub skipped: usize,
    /// Modified too recently; left for a later cycle.
    #[serde(default)]
    pub settling: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: CategoryCounts,
    pub events: CategoryCounts,
    pub usage: CategoryCounts,
    /// Stopped at a file boundary because cancellation was requested.
    pub cancelled: bool,
    /// Set when the whole cycle was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ledger: LedgerSizes,
}

impl CycleSummary {
    fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            results: CategoryCounts::default(),
            events: CategoryCounts::default(),
            usage: CategoryCounts::default(),
            cancelled: false,
            error: None,
            ledger: LedgerSizes::default(),
        }
    }

    pub fn counts(&self, category: ReportCategory) -> &CategoryCounts {
        match category {
            ReportCategory::Results => &self.results,
            ReportCategory::Events => &self.events,
            ReportCategory::Usage => &self.usage,
        }
    }

    fn counts_mut(&mut self, category: ReportCategory) -> &mut CategoryCounts {
        match category {
            ReportCategory::Results => &mut self.results,
            ReportCategory::Events => &mut self.events,
            ReportCategory::Usage => &mut self.usage,
        }
    }

    pub fn processed(&self) -> usize {
        self.results.processed + self.events.processed + self.usage.processed
    }

    pub fn failed(&self) -> usize {
        self.results.failed + self.events.failed + self.usage.failed
    }
}

#[derive(Debug)]
pub struct Scanner {
    settings: ScanSettings,
    ledger: Ledger,
    ledger_path: Option<PathBuf>,
}

impl Scanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            settings,
            ledger: Ledger::new(),
            ledger_path: None,
        }
    }

    /// Keep the ledger at `path`: load it now, save it after every cycle
    /// that marked a file.
    pub fn with_persistent_ledger(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.ledger = Ledger::load_or_default(&path);
        self.ledger_path = Some(path);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run one cycle. Never fails: an aborted cycle is logged and reported
    /// through [`CycleSummary::error`].
    pub fn run<T: Transport>(
        &mut self,
        client: &mut SyncClient<T>,
        cancel: &CancellationToken,
    ) -> CycleSummary {
        let clock = Instant::now();
        let mut summary = CycleSummary::begin(Utc::now());
        let before = self.ledger.sizes();

        if let Err(err) = self.scan(client, cancel, &mut summary) {
            error!(
                directory = %self.settings.directory.display(),
                error = %err,
                "scan cycle aborted"
            );
            summary.error = Some(err.to_string());
        }

        summary.ledger = self.ledger.sizes();
        if summary.ledger != before {
            self.persist_ledger();
        }
        summary.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            results_processed = summary.results.processed,
            results_failed = summary.results.failed,
            events_processed = summary.events.processed,
            events_failed = summary.events.failed,
            usage_processed = summary.usage.processed,
            usage_failed = summary.usage.failed,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "scan cycle finished"
        );
        summary
    }

    fn scan<T: Transport>(
        &mut self,
        client: &mut SyncClient<T>,
        cancel: &CancellationToken,
        summary: &mut CycleSummary,
    ) -> Result<(), ScanError> {
        let directory = self.settings.directory.clone();
        if !directory.is_dir() {
            return Err(ScanError::DirectoryMissing { path: directory });
        }
        let names = list_file_names(&directory)?;

        for category in ReportCategory::ALL {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }
            if self.settings.synthetic_mode && category != ReportCategory::Events {
                self.send_demo(category, client, summary);
                continue;
            }

            for name in names.iter().filter(|n| category.matches(n)) {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    return Ok(());
                }
                if self.ledger.contains(category, name) {
                    summary.counts_mut(category).skipped += 1;
                    continue;
                }
                let path = directory.join(name);
                if self.is_settling(&path) {
                    summary.counts_mut(category).settling += 1;
                    debug!(file = %name, %category, "still being written; deferred");
                    continue;
                }
                match self.process(category, &path, name, client) {
                    Ok(()) => {
                        self.ledger.mark(category, name);
                        summary.counts_mut(category).processed += 1;
                        info!(file = %name, %category, "file synced");
                    }
                    Err(err) => {
                        summary.counts_mut(category).failed += 1;
                        warn!(file = %name, %category, error = %err, "file not synced; will retry");
                    }
                }
            }
        }
        Ok(())
    }

    fn process<T: Transport>(
        &self,
        category: ReportCategory,
        path: &Path,
        name: &str,
        client: &mut SyncClient<T>,
    ) -> Result<(), ScanError> {
        let parse_failed = |source: ParseError| ScanError::Parse {
            file: name.to_string(),
            source,
        };
        debug!(file = %name, %category, "processing");

        match category {
            ReportCategory::Results => {
                let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
                let report =
                    parse_result_report(&content, &self.context(name)).map_err(parse_failed)?;
                client.send_results(&report)?;
            }
            ReportCategory::Events => {
                let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
                let serial = resolve_log_serial(name, self.settings.serial_number.as_ref())
                    .map_err(parse_failed)?;
                let log = build_log_file(name, &bytes, serial).map_err(parse_failed)?;
                client.upload_log(&log)?;
            }
            ReportCategory::Usage => {
                let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
                let report =
                    parse_usage_report(&content, &self.context(name)).map_err(parse_failed)?;
                client.send_metrics(&report)?;
            }
        }
        Ok(())
    }

    /// Synthetic mode stands in one fixed payload for the whole category.
    /// Nothing is marked: the fixture is sent again every cycle.
    fn send_demo<T: Transport>(
        &self,
        category: ReportCategory,
        client: &mut SyncClient<T>,
        summary: &mut CycleSummary,
    ) {
        let serial = self
            .settings
            .serial_number
            .clone()
            .unwrap_or_else(|| SerialNumber::from(DEMO_SERIAL));
        let now = local_now();
        let sent = match category {
            ReportCategory::Results => client.send_results(&demo_result_report(&serial, now)),
            ReportCategory::Usage => client.send_metrics(&demo_metrics_report(&serial, now)),
            ReportCategory::Events => return,
        };
        match sent {
            Ok(()) => {
                summary.counts_mut(category).processed += 1;
                info!(%category, serial = %serial, "demonstration payload synced");
            }
            Err(err) => {
                summary.counts_mut(category).failed += 1;
                warn!(%category, error = %err, "demonstration payload not synced");
            }
        }
    }

    fn context(&self, file_name: &str) -> ParseContext {
        let serial = self
            .settings
            .serial_number
            .clone()
            .or_else(|| serial_from_file_name(file_name).ok());
        let mut ctx = ParseContext::new(serial, local_now());
        ctx.assay_success_rates = self.settings.assay_success_rates;
        ctx
    }

    /// `true` while `path` was modified inside the settle window. A file
    /// whose metadata cannot be read is left to `process` to report.
    fn is_settling(&self, path: &Path) -> bool {
        if self.settings.settle_window.is_zero() {
            return false;
        }
        let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.settings.settle_window,
            // mtime ahead of the clock: don't hold the file back forever
            Err(_) => false,
        }
    }

    fn persist_ledger(&self) {
        let Some(path) = &self.ledger_path else {
            return;
        };
        if let Err(err) = self.ledger.save(path) {
            warn!(path = %path.display(), error = %err, "could not save ledger");
        }
    }
}

/// Regular files directly inside `directory`, sorted by name. Names that are
/// not valid UTF-8 cannot match a report pattern and are dropped.
fn list_file_names(directory: &Path) -> Result<Vec<String>, ScanError> {
    let entries = std::fs::read_dir(directory).map_err(|e| io_err(directory, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(directory, e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}
