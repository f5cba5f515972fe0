//! On-disk layout under `~/.neolink/`.
//!
//! ```text
//! ~/.neolink/
//!   config.yaml       (agent configuration — mode 0600)
//!   neolink.sock      (daemon control socket)
//!   state/
//!     ledger.json     (processed-file ledger, only with `persist_ledger`)
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const DAEMON_SOCKET: &str = "neolink.sock";
pub const LEDGER_FILE: &str = "ledger.json";

pub fn neolink_root(home: &Path) -> PathBuf {
    home.join(".neolink")
}

pub fn config_path(home: &Path) -> PathBuf {
    neolink_root(home).join(CONFIG_FILE)
}

pub fn socket_path(home: &Path) -> PathBuf {
    neolink_root(home).join(DAEMON_SOCKET)
}

pub fn state_dir(home: &Path) -> PathBuf {
    neolink_root(home).join("state")
}

pub fn ledger_path(home: &Path) -> PathBuf {
    state_dir(home).join(LEDGER_FILE)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
