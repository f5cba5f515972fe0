//! `neolink daemon` — background agent lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use neolink_core::paths::socket_path;
use neolink_daemon::{request, start_blocking, DaemonError, DaemonRequest};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the agent in the foreground (scan loop + watcher + socket server).
    Start,
    /// Request graceful shutdown over the Unix socket.
    Stop,
    /// Query runtime status over the Unix socket.
    Status,
    /// Run one cycle inside the running daemon and print its summary.
    Scan,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request(&home, DaemonRequest::Stop) {
            Ok(_) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request(&home, DaemonRequest::Status) {
            Ok(status) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Scan => {
            let summary = request(&home, DaemonRequest::Scan).context("daemon scan failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&summary)
                    .context("failed to render scan summary JSON")?
            );
        }
    }

    Ok(())
}
