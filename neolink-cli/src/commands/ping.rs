//! `neolink ping`

use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct PingArgs {}

impl PingArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        super::client_for(&config)
            .ping()
            .with_context(|| format!("NeoSync at {} is not reachable", config.neosync.url))?;
        println!("✓ NeoSync reachable at {}", config.neosync.url);
        Ok(())
    }
}
