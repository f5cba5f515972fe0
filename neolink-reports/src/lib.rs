//! # neolink-reports
//!
//! Pure parsers turning one instrument report into one canonical resource.
//! No I/O: callers hand in file names, already-read content and a
//! [`ParseContext`].
//!
//! | Family | Pattern | Parser |
//! |---|---|---|
//! | sample-result report | `SRR_*.xml` | [`results::parse_result_report`] |
//! | system-event log | `SER_*.txt` | [`events::build_log_file`] |
//! | system-usage report | `SUR_*.xml` | [`usage::parse_usage_report`] |

pub mod classify;
pub mod demo;
pub mod error;
pub mod events;
pub mod markup;
pub mod results;
pub mod usage;
pub mod values;

use chrono::{DateTime, FixedOffset};
use neolink_core::SerialNumber;

pub use classify::{classify, serial_from_file_name, ReportCategory};
pub use error::ParseError;
pub use markup::{Fields, ReportDocument};

/// Values a parser needs that are not in the report itself.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Serial used when the report header carries none (static config
    /// serial, or the one in the file name).
    pub serial_number: Option<SerialNumber>,
    /// Moment the report was picked up; becomes `MessageDate` and the
    /// fallback metric timestamp.
    pub observed_at: DateTime<FixedOffset>,
    /// Append per-assay success-rate metrics for lot-less assay records.
    pub assay_success_rates: bool,
}

impl ParseContext {
    pub fn new(serial_number: Option<SerialNumber>, observed_at: DateTime<FixedOffset>) -> Self {
        Self {
            serial_number,
            observed_at,
            assay_success_rates: true,
        }
    }
}
