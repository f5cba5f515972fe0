//! neolink — instrument report sync agent.
//!
//! # Usage
//!
//! ```text
//! neolink init --directory <path> --url <url> --vendor-key <key> --site-code <code> [--serial <sn>]
//! neolink scan [--json]
//! neolink ping
//! neolink firmware <serial>
//! neolink daemon start|stop|status|scan
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, firmware::FirmwareArgs, init::InitArgs, ping::PingArgs, scan::ScanArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "neolink",
    version,
    about = "Sync instrument result, event and usage reports to NeoSync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.neolink/config.yaml.
    Init(InitArgs),

    /// Run one scan cycle in the foreground and print its summary.
    Scan(ScanArgs),

    /// Check that the NeoSync service is reachable.
    Ping(PingArgs),

    /// Ask NeoSync whether a firmware update exists for a device.
    Firmware(FirmwareArgs),

    /// Run or control the background agent.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Scan(args) => args.run(),
        Commands::Ping(args) => args.run(),
        Commands::Firmware(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
