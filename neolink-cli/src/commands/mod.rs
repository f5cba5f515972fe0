pub mod daemon;
pub mod firmware;
pub mod init;
pub mod ping;
pub mod scan;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use neolink_client::{SyncClient, UreqTransport};
use neolink_core::{config, AgentConfig};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_config(home: &std::path::Path) -> Result<AgentConfig> {
    config::load_at(home).context("failed to load config; run `neolink init` first")
}

pub(crate) fn client_for(config: &AgentConfig) -> SyncClient<UreqTransport> {
    SyncClient::new(UreqTransport::new(
        &config.neosync,
        Duration::from_secs(config.http_timeout_secs),
    ))
}
