use std::path::Path;
use std::time::Duration;

use neolink_client::{SyncClient, Transport, UreqTransport};
use neolink_core::{paths::ledger_path, AgentConfig};
use neolink_scan::{CancellationToken, CycleSummary, ScanSettings, Scanner};

/// A scanner paired with the client it syncs through. Owned by exactly one
/// task at a time, so cycles never overlap.
#[derive(Debug)]
pub struct Agent<T: Transport> {
    scanner: Scanner,
    client: SyncClient<T>,
}

impl Agent<UreqTransport> {
    /// Wire the production agent described by `config`.
    pub fn from_config(home: &Path, config: &AgentConfig) -> Self {
        let transport = UreqTransport::new(
            &config.neosync,
            Duration::from_secs(config.http_timeout_secs),
        );
        let mut scanner = Scanner::new(ScanSettings::from_config(config));
        if config.persist_ledger {
            scanner = scanner.with_persistent_ledger(ledger_path(home));
        }
        Self::new(scanner, SyncClient::new(transport))
    }
}

impl<T: Transport> Agent<T> {
    pub fn new(scanner: Scanner, client: SyncClient<T>) -> Self {
        Self { scanner, client }
    }

    pub fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleSummary {
        self.scanner.run(&mut self.client, cancel)
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn client(&mut self) -> &mut SyncClient<T> {
        &mut self.client
    }
}
