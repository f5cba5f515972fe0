//! Processed-file ledger: one set of file names per report category.
//!
//! A name enters its set only after the service accepted the file, and never
//! leaves it while the process runs. With `persist_ledger` the sets are kept
//! in `~/.neolink/state/ledger.json`, written with the same `.tmp` + rename
//! pattern as the config file.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use neolink_reports::ReportCategory;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ScanError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    results: BTreeSet<String>,
    #[serde(default)]
    events: BTreeSet<String>,
    #[serde(default)]
    usage: BTreeSet<String>,
}

/// Entry counts per category, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSizes {
    pub results: usize,
    pub events: usize,
    pub usage: usize,
}

/// On-disk ledger payload.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    ledger: Ledger,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, category: ReportCategory) -> &BTreeSet<String> {
        match category {
            ReportCategory::Results => &self.results,
            ReportCategory::Events => &self.events,
            ReportCategory::Usage => &self.usage,
        }
    }

    fn set_mut(&mut self, category: ReportCategory) -> &mut BTreeSet<String> {
        match category {
            ReportCategory::Results => &mut self.results,
            ReportCategory::Events => &mut self.events,
            ReportCategory::Usage => &mut self.usage,
        }
    }

    pub fn contains(&self, category: ReportCategory, file_name: &str) -> bool {
        self.set(category).contains(file_name)
    }

    /// Record `file_name` as processed. Returns `false` if it already was.
    pub fn mark(&mut self, category: ReportCategory, file_name: &str) -> bool {
        self.set_mut(category).insert(file_name.to_string())
    }

    pub fn len(&self, category: ReportCategory) -> usize {
        self.set(category).len()
    }

    pub fn is_empty(&self) -> bool {
        ReportCategory::ALL.iter().all(|c| self.set(*c).is_empty())
    }

    pub fn sizes(&self) -> LedgerSizes {
        LedgerSizes {
            results: self.results.len(),
            events: self.events.len(),
            usage: self.usage.len(),
        }
    }

    /// Load the ledger at `path`; an absent file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let file: LedgerFile = serde_json::from_str(&contents)?;
        Ok(file.ledger)
    }

    /// Like [`load`](Self::load), but an unreadable ledger starts over empty.
    /// Files it listed are sent again, which the service tolerates better
    /// than an agent that refuses to start.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(ledger) => ledger,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable ledger");
                Self::default()
            }
        }
    }

    /// Save atomically: write `<path>.tmp`, then rename.
    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(&LedgerFile {
            saved_at: Utc::now(),
            ledger: self.clone(),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn categories_are_independent() {
        let mut ledger = Ledger::new();
        assert!(ledger.mark(ReportCategory::Results, "SRR_a.xml"));
        assert!(!ledger.mark(ReportCategory::Results, "SRR_a.xml"));
        assert!(ledger.contains(ReportCategory::Results, "SRR_a.xml"));
        assert!(!ledger.contains(ReportCategory::Usage, "SRR_a.xml"));
        assert_eq!(
            ledger.sizes(),
            LedgerSizes {
                results: 1,
                events: 0,
                usage: 0
            }
        );
    }

    #[rstest]
    #[case(ReportCategory::Results)]
    #[case(ReportCategory::Events)]
    #[case(ReportCategory::Usage)]
    fn marking_one_category_counts_once(#[case] category: ReportCategory) {
        let mut ledger = Ledger::new();
        ledger.mark(category, "report");
        ledger.mark(category, "report");
        assert_eq!(ledger.len(category), 1);
        assert!(ledger.contains(category, "report"));
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::load(&tmp.path().join("state/ledger.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("ledger.json");
        let mut ledger = Ledger::new();
        ledger.mark(ReportCategory::Events, "SER_456def_1.txt");
        ledger.mark(ReportCategory::Usage, "SUR_456def_1.xml");
        ledger.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(Ledger::load(&path).unwrap(), ledger);
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Ledger::load(&path).is_err());
        assert!(Ledger::load_or_default(&path).is_empty());
    }
}
