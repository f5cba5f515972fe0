//! neolink core library — canonical device-telemetry types, agent
//! configuration, on-disk layout, errors.
//!
//! - [`types`] — resources exchanged with NeoSync and their send-time invariants
//! - [`config`] — `~/.neolink/config.yaml` load / save
//! - [`paths`] — `~/.neolink/` layout
//! - [`error`] — [`ConfigError`], [`ValidationError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{AgentConfig, LogFormat, NeoSyncConfig};
pub use error::{ConfigError, ValidationError};
pub use types::{
    DeviceIdentity, DeviceInformation, LogFile, Metric, MetricsReport, ResultRecord, ResultReport,
    SampleType, SerialNumber,
};
