//! Error types for neolink-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SampleType;

/// Errors raised while loading or saving the agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.neolink/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No config file at the expected path.
    #[error("config not found at {path}; run `neolink init` first")]
    ConfigNotFound { path: PathBuf },

    /// A field is present but unusable.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Send-time invariant violations on a canonical resource.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("required field `{field}` is empty")]
    MissingField { field: &'static str },

    #[error("unsupported schema version {version}; expected 1")]
    UnsupportedVersion { version: u32 },

    #[error("`LotNumber` is required if SampleType is {sample_type}")]
    LotNumberRequired { sample_type: SampleType },

    #[error("`{field}` is required")]
    UnsetDate { field: &'static str },

    #[error("sequence number {sequence} outside 1..=1000")]
    SequenceOutOfRange { sequence: u32 },

    #[error("sequence number {sequence} appears more than once")]
    DuplicateSequence { sequence: u32 },

    #[error("metric name is {len} characters long; at most 255 allowed")]
    MetricNameTooLong { len: usize },

    #[error("metrics report for {serial} carries no metrics")]
    EmptyMetrics { serial: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
