//! `neolink scan` — one foreground scan cycle.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use neolink_daemon::{init_tracing, Agent};
use neolink_scan::{CancellationToken, CategoryCounts, CycleSummary};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Emit the cycle summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        init_tracing(config.log_format);

        let mut agent = Agent::from_config(&home, &config);
        let summary = agent.run_cycle(&CancellationToken::new());

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to render summary JSON")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "category")]
    category: &'static str,
    #[tabled(rename = "sent")]
    processed: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "already sent")]
    skipped: usize,
    #[tabled(rename = "still writing")]
    settling: usize,
}

fn row(category: &'static str, counts: &CategoryCounts) -> Row {
    Row {
        category,
        processed: counts.processed,
        failed: counts.failed,
        skipped: counts.skipped,
        settling: counts.settling,
    }
}

fn print_summary(summary: &CycleSummary) {
    if let Some(error) = &summary.error {
        println!("{} scan aborted: {error}", "✗".red().bold());
        return;
    }

    let mut table = Table::new([
        row("results", &summary.results),
        row("events", &summary.events),
        row("usage", &summary.usage),
    ]);
    table.with(Style::rounded());
    println!("{table}");

    let mark = if summary.failed() == 0 {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    println!(
        "{mark} {} sent, {} failed in {} ms{}",
        summary.processed(),
        summary.failed(),
        summary.duration_ms,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
}
