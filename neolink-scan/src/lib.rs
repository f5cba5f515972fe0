//! # neolink-scan
//!
//! Incremental directory scanner and processed-file ledger.
//!
//! One [`Scanner::run`] call is one scan cycle: list the watch directory,
//! hand every unseen `SRR_`/`SER_`/`SUR_` file to its parser and to the
//! [`SyncClient`](neolink_client::SyncClient), and record it in the
//! [`Ledger`] only once the service has accepted it.

pub mod cancel;
pub mod error;
pub mod ledger;
pub mod scanner;

pub use cancel::CancellationToken;
pub use error::ScanError;
pub use ledger::{Ledger, LedgerSizes};
pub use scanner::{CategoryCounts, CycleSummary, ScanSettings, Scanner};
