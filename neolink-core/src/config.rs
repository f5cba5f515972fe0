//! Agent configuration, loaded once at process start.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths::{config_path, home, neolink_root};

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SETTLE_SECS: u64 = 5;

/// Connection settings for the NeoSync ingestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoSyncConfig {
    /// Base URL; routes such as `api/v1/device/register/` are joined onto it.
    pub url: String,
    pub vendor_key: String,
    pub site_code: String,
}

/// Log output format of the daemon and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Contents of `~/.neolink/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory the instrument writes its report files into.
    pub directory_to_scan: PathBuf,
    pub neosync: NeoSyncConfig,
    /// Static instrument serial. Event logs use it directly; when unset the
    /// serial is parsed from the file name (`SER_<serial>_...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// A report modified less than this many seconds ago is still being
    /// written; it is left for a later cycle. `0` disables the check.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Demo only: send a fixed demonstration result and metrics report each
    /// cycle instead of scanning `SRR_`/`SUR_` files.
    #[serde(default)]
    pub synthetic_mode: bool,
    /// Append a `<assay> Success Rate` metric for every lot-less assay record.
    #[serde(default = "default_true")]
    pub assay_success_rates: bool,
    /// Keep the processed-file ledger in `~/.neolink/state/ledger.json`.
    #[serde(default)]
    pub persist_ledger: bool,
    /// Trigger an early cycle when report files appear in the directory.
    #[serde(default = "default_true")]
    pub watch_directory: bool,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_settle_secs() -> u64 {
    DEFAULT_SETTLE_SECS
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    /// A config with every optional setting at its default.
    pub fn new(directory_to_scan: PathBuf, neosync: NeoSyncConfig) -> Self {
        Self {
            directory_to_scan,
            neosync,
            serial_number: None,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            settle_secs: DEFAULT_SETTLE_SECS,
            synthetic_mode: false,
            assay_success_rates: true,
            persist_ledger: false,
            watch_directory: true,
            log_format: LogFormat::Text,
        }
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.neosync.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "neosync.url",
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
        if self.directory_to_scan.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "directory_to_scan",
                reason: "must not be empty".into(),
            });
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scan_interval_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "http_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if matches!(self.serial_number.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "serial_number",
                reason: "must not be blank when set".into(),
            });
        }
        Ok(())
    }
}

/// Load and validate `<home>/.neolink/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<AgentConfig, ConfigError> {
    let path = config_path(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: AgentConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<AgentConfig, ConfigError> {
    load_at(&home()?)
}

/// Save `config` atomically: write `config.yaml.tmp`, then rename.
pub fn save_at(home: &Path, config: &AgentConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let root = neolink_root(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let path = config_path(home);
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &AgentConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AgentConfig {
        AgentConfig::new(
            PathBuf::from("/data/revogene/reports"),
            NeoSyncConfig {
                url: "https://neosync.example.com/".into(),
                vendor_key: "vk".into(),
                site_code: "site-1".into(),
            },
        )
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = r#"
directory_to_scan: /data/reports
neosync:
  url: https://neosync.example.com/
  vendor_key: abc
  site_code: sf-lab
"#;
        let config: AgentConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.scan_interval_secs, DEFAULT_SCAN_INTERVAL_SECS);
        assert_eq!(config.settle_secs, DEFAULT_SETTLE_SECS);
        assert!(!config.synthetic_mode);
        assert!(config.assay_success_rates);
        assert!(!config.persist_ledger);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.serial_number, None);
    }

    #[test]
    fn rejects_non_http_url() {
        let mut config = sample();
        config.neosync.url = "ftp://nope".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "neosync.url", .. }));
    }

    #[test]
    fn rejects_zero_interval() {
        let mut config = sample();
        config.scan_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_static_serial_is_rejected() {
        let mut config = sample();
        config.serial_number = Some("  ".into());
        assert!(config.validate().is_err());
    }
}
