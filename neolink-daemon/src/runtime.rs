use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use neolink_client::Transport;
use neolink_core::{
    paths::{neolink_root, socket_path},
    AgentConfig,
};
use neolink_scan::{CancellationToken, CycleSummary, LedgerSizes};

use crate::agent::Agent;
use crate::error::{io_err, DaemonError};
use crate::logging::init_tracing;
use crate::protocol::{DaemonRequest, DaemonResponse};

pub(crate) const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

struct ScanJob {
    source: &'static str,
    respond_to: Option<oneshot::Sender<CycleSummary>>,
}

/// What `status` reports; updated by the scan processor after each cycle.
#[derive(Debug)]
struct DaemonState {
    started_at: DateTime<Utc>,
    directory: PathBuf,
    scan_interval_secs: u64,
    synthetic_mode: bool,
    cycles: u64,
    last_cycle: Option<CycleSummary>,
    ledger: LedgerSizes,
}

type SharedState = Arc<RwLock<DaemonState>>;

/// Load the config, then run the daemon on a fresh runtime, blocking the
/// current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let config = neolink_core::config::load_at(home)?;
    init_tracing(config.log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the daemon against the real NeoSync service.
pub async fn run(home: PathBuf, config: AgentConfig) -> Result<(), DaemonError> {
    let agent = Agent::from_config(&home, &config);
    serve(home, config, agent).await
}

/// Run the daemon tasks around `agent` until a stop request or ctrl-c.
pub async fn serve<T>(home: PathBuf, config: AgentConfig, agent: Agent<T>) -> Result<(), DaemonError>
where
    T: Transport + Send + 'static,
{
    let root = neolink_root(&home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    tracing::info!(
        directory = %config.directory_to_scan.display(),
        interval_secs = config.scan_interval_secs,
        synthetic_mode = config.synthetic_mode,
        "starting neolink daemon"
    );

    let state: SharedState = Arc::new(RwLock::new(DaemonState {
        started_at: Utc::now(),
        directory: config.directory_to_scan.clone(),
        scan_interval_secs: config.scan_interval_secs,
        synthetic_mode: config.synthetic_mode,
        cycles: 0,
        last_cycle: None,
        ledger: agent.scanner().ledger().sizes(),
    }));
    let cancel = CancellationToken::new();

    // Capacity 1: background triggers are dropped while a cycle is queued.
    let (scan_tx, scan_rx) = mpsc::channel::<ScanJob>(1);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result =
                scan_processor_task(agent, state, cancel, scan_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let scan_tx = scan_tx.clone();
        let interval = Duration::from_secs(config.scan_interval_secs.max(1));
        tokio::spawn(async move {
            let result = scan_timer_task(interval, scan_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let scan_tx = scan_tx.clone();
        let directory = config.directory_to_scan.clone();
        let enabled = config.watch_directory;
        tokio::spawn(async move {
            let result = if enabled {
                watcher_task(directory, scan_tx, shutdown.subscribe()).await
            } else {
                Ok(())
            };
            if result.is_err() {
                let _ = shutdown.send(());
            }
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                state,
                scan_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let cancel_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            cancel.cancel();
            Ok::<(), DaemonError>(())
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, timer_result, watcher_result, socket_result, cancel_result, signal_result) =
        tokio::join!(
            processor_handle,
            timer_handle,
            watcher_handle,
            socket_handle,
            cancel_handle,
            signal_handle
        );

    handle_join("scan_processor", processor_result)?;
    handle_join("scan_timer", timer_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("cancel", cancel_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("neolink daemon stopped");
    Ok(())
}

/// Owns the agent; runs queued cycles one at a time on the blocking pool.
async fn scan_processor_task<T>(
    mut agent: Agent<T>,
    state: SharedState,
    cancel: CancellationToken,
    mut scan_rx: mpsc::Receiver<ScanJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    T: Transport + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = scan_rx.recv() => {
                let Some(job) = maybe_job else { break };
                tracing::debug!(source = job.source, "scan cycle starting");

                let token = cancel.clone();
                let (returned, summary) = tokio::task::spawn_blocking(move || {
                    let summary = agent.run_cycle(&token);
                    (agent, summary)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("scan task join error: {err}")))?;
                agent = returned;

                {
                    let mut state = state.write().await;
                    state.cycles += 1;
                    state.ledger = summary.ledger;
                    state.last_cycle = Some(summary.clone());
                }

                if let Some(respond_to) = job.respond_to {
                    let _ = respond_to.send(summary);
                }
            }
        }
    }
    Ok(())
}

/// First tick fires immediately, then every `interval`. Ticks missed while
/// a cycle is running are skipped rather than replayed.
async fn scan_timer_task(
    interval: Duration,
    scan_tx: mpsc::Sender<ScanJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if !trigger_scan(&scan_tx, "timer") {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Queue a background cycle unless one is already waiting. Returns `false`
/// once the processor is gone.
fn trigger_scan(scan_tx: &mpsc::Sender<ScanJob>, source: &'static str) -> bool {
    match scan_tx.try_send(ScanJob {
        source,
        respond_to: None,
    }) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!(source, "scan already queued; trigger dropped");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn watcher_task(
    directory: PathBuf,
    scan_tx: mpsc::Sender<ScanJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if !directory.is_dir() {
        tracing::warn!(
            directory = %directory.display(),
            "watch directory missing; relying on the scan interval"
        );
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&directory, RecursiveMode::NonRecursive)?;
    tracing::debug!(directory = %directory.display(), "watching report directory");

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                for path in event.paths {
                    if !is_report_file(&path) {
                        continue;
                    }
                    if !should_process_event(&mut debounce, &path, Instant::now()) {
                        continue;
                    }
                    tracing::debug!(file = %path.display(), "report file changed");
                    if !trigger_scan(&scan_tx, "watcher") {
                        return Ok(());
                    }
                }
            }
        }
    }
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    state: SharedState,
    scan_tx: mpsc::Sender<ScanJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let state = state.clone();
                let scan_tx = scan_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, state, scan_tx, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    state: SharedState,
    scan_tx: mpsc::Sender<ScanJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "rejected control request");
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };
        tracing::debug!(%request, "control request");

        let response = match request {
            DaemonRequest::Status => DaemonResponse::ok(build_status_payload(&home, &state).await),
            DaemonRequest::Scan => match enqueue_scan(&scan_tx, "socket").await {
                Ok(summary) => DaemonResponse::ok(json!(summary)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };

        write_response(&mut writer, &response).await?;
        if request.ends_session() {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(home: &Path, state: &SharedState) -> Value {
    let state = state.read().await;
    json!({
        "running": true,
        "started_at": state.started_at.to_rfc3339(),
        "directory": state.directory.display().to_string(),
        "scan_interval_secs": state.scan_interval_secs,
        "synthetic_mode": state.synthetic_mode,
        "cycles": state.cycles,
        "last_cycle": state.last_cycle,
        "ledger": state.ledger,
        "socket": socket_path(home).display().to_string(),
    })
}

/// Queue a cycle and wait for its summary. Waits behind an already queued
/// cycle instead of being dropped.
async fn enqueue_scan(
    scan_tx: &mpsc::Sender<ScanJob>,
    source: &'static str,
) -> Result<CycleSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    scan_tx
        .send(ScanJob {
            source,
            respond_to: Some(tx),
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("scan queue"))?;
    rx.await
        .map_err(|_| DaemonError::ChannelClosed("scan response"))
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn is_report_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(neolink_reports::classify)
        .is_some()
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let threshold = Duration::from_millis(100);
        let mut debounce = HashMap::<PathBuf, Instant>::new();
        let path = PathBuf::from("/data/reports/SRR_456def_1.xml");
        let mut triggers = 0usize;

        for _ in 0..5 {
            if should_process_event_with_threshold(&mut debounce, &path, Instant::now(), threshold)
            {
                triggers += 1;
            }
            advance(Duration::from_millis(10)).await;
        }
        assert_eq!(triggers, 1, "rapid writes should collapse to one trigger");

        advance(Duration::from_millis(150)).await;
        assert!(should_process_event_with_threshold(
            &mut debounce,
            &path,
            Instant::now(),
            threshold
        ));
    }

    #[test]
    fn only_report_files_trigger_scans() {
        assert!(is_report_file(Path::new("/data/SRR_456def_1.xml")));
        assert!(is_report_file(Path::new("/data/SER_456def_1.txt")));
        assert!(is_report_file(Path::new("/data/SUR_456def_1.xml")));
        assert!(!is_report_file(Path::new("/data/SRR_456def_1.xml.part")));
        assert!(!is_report_file(Path::new("/data/notes.txt")));
    }

    #[tokio::test]
    async fn background_triggers_do_not_pile_up() {
        let (scan_tx, mut scan_rx) = mpsc::channel::<ScanJob>(1);
        assert!(trigger_scan(&scan_tx, "timer"));
        assert!(trigger_scan(&scan_tx, "watcher"));
        assert_eq!(scan_rx.recv().await.map(|job| job.source), Some("timer"));
        assert!(scan_rx.try_recv().is_err());

        drop(scan_rx);
        assert!(!trigger_scan(&scan_tx, "timer"));
    }
}
