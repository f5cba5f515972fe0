//! `neolink firmware <serial>` — firmware update check.

use anyhow::{Context, Result};
use clap::Args;

use neolink_core::SerialNumber;

#[derive(Args, Debug)]
pub struct FirmwareArgs {
    /// Instrument serial number.
    pub serial: String,
}

impl FirmwareArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        let serial = SerialNumber::from(self.serial);

        let response = super::client_for(&config)
            .check_for_firmware_update(&serial)
            .with_context(|| format!("firmware check failed for {serial}"))?;
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("failed to render response JSON")?
        );
        Ok(())
    }
}
