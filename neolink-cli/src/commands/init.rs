//! `neolink init` — write the agent configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use neolink_core::{config, paths::config_path, AgentConfig, NeoSyncConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory the instrument writes its report files into.
    #[arg(long, short = 'd')]
    pub directory: PathBuf,

    /// NeoSync base URL, e.g. https://neosync.example.com
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub vendor_key: String,

    #[arg(long)]
    pub site_code: String,

    /// Static instrument serial; otherwise taken from report file names.
    #[arg(long)]
    pub serial: Option<String>,

    /// Seconds between scan cycles.
    #[arg(long, default_value_t = config::DEFAULT_SCAN_INTERVAL_SECS)]
    pub interval: u64,

    /// Seconds a report must sit unmodified before it is read; 0 reads at once.
    #[arg(long, default_value_t = config::DEFAULT_SETTLE_SECS)]
    pub settle: u64,

    /// Send the fixed demonstration payloads instead of result and usage files.
    #[arg(long)]
    pub synthetic: bool,

    /// Remember processed files across restarts.
    #[arg(long)]
    pub persist_ledger: bool,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let existing = config_path(&home);
        if existing.exists() && !self.force {
            bail!(
                "config already exists at {}; pass --force to overwrite",
                existing.display()
            );
        }

        let mut agent = AgentConfig::new(
            self.directory,
            NeoSyncConfig {
                url: self.url,
                vendor_key: self.vendor_key,
                site_code: self.site_code,
            },
        );
        agent.serial_number = self.serial;
        agent.scan_interval_secs = self.interval;
        agent.settle_secs = self.settle;
        agent.synthetic_mode = self.synthetic;
        agent.persist_ledger = self.persist_ledger;

        let path = config::save_at(&home, &agent).context("failed to write config")?;
        println!("✓ Wrote {}", path.display());
        println!("  Watching: {}", agent.directory_to_scan.display());
        if agent.synthetic_mode {
            println!("  Synthetic mode: demonstration payloads only");
        }
        Ok(())
    }
}
