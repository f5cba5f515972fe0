//! Error types for neolink-scan.

use std::path::PathBuf;

use neolink_client::ClientError;
use neolink_reports::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The watch directory is absent or not a directory; the cycle stops
    /// before touching any file.
    #[error("watch directory {path} does not exist")]
    DirectoryMissing { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("sync error: {0}")]
    Client(#[from] ClientError),

    /// Ledger (de)serialization.
    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ScanError {
    ScanError::Io {
        path: path.into(),
        source,
    }
}
