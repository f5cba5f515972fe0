use std::path::Path;
use std::time::{Duration, SystemTime};

use neolink_client::routes;
use neolink_client::testing::FakeTransport;
use neolink_client::SyncClient;
use neolink_reports::ReportCategory;
use neolink_scan::{CancellationToken, Ledger, ScanSettings, Scanner};
use filetime::FileTime;
use tempfile::TempDir;

const RESULTS_XML: &str = include_str!("fixtures/SRR_456def_20240301_0915.xml");
const USAGE_XML: &str = include_str!("fixtures/SUR_456def_20240301.xml");

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn populated_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "SRR_456def_20240301_0915.xml", RESULTS_XML);
    write(tmp.path(), "SER_456def_20240301.txt", "03/01/2024 09:00 boot\n");
    write(tmp.path(), "SUR_456def_20240301.xml", USAGE_XML);
    write(tmp.path(), "README.md", "not a report");
    tmp
}

/// Settings that read files as soon as they appear.
fn settled(directory: &Path) -> ScanSettings {
    let mut settings = ScanSettings::new(directory);
    settings.settle_window = Duration::ZERO;
    settings
}

fn backdate(path: &Path, secs: u64) {
    let then = SystemTime::now() - Duration::from_secs(secs);
    filetime::set_file_mtime(path, FileTime::from_system_time(then)).unwrap();
}

fn fake_client() -> (FakeTransport, SyncClient<FakeTransport>) {
    let fake = FakeTransport::new();
    (fake.clone(), SyncClient::new(fake))
}

#[test]
fn each_file_is_sent_once_across_cycles() {
    let dir = populated_dir();
    let (fake, mut client) = fake_client();
    let mut scanner = Scanner::new(settled(dir.path()));
    let cancel = CancellationToken::new();

    let first = scanner.run(&mut client, &cancel);
    assert_eq!(first.processed(), 3);
    assert_eq!(first.failed(), 0);
    assert!(first.error.is_none());

    let second = scanner.run(&mut client, &cancel);
    assert_eq!(second.processed(), 0);
    assert_eq!(second.results.skipped, 1);
    assert_eq!(second.events.skipped, 1);
    assert_eq!(second.usage.skipped, 1);

    assert_eq!(fake.count(routes::RESULTS), 1);
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 1);
    assert_eq!(fake.count(routes::METRICS_SEND), 1);
    assert_eq!(fake.count(routes::REGISTER), 1);
}

#[test]
fn categories_run_results_then_events_then_usage() {
    let dir = populated_dir();
    let (fake, mut client) = fake_client();
    let mut scanner = Scanner::new(settled(dir.path()));
    scanner.run(&mut client, &CancellationToken::new());

    let order: Vec<&str> = fake
        .requests()
        .into_iter()
        .map(|r| r.route)
        .filter(|route| *route != routes::REGISTER)
        .collect();
    assert_eq!(
        order,
        vec![routes::RESULTS, routes::LOGS_UPLOAD, routes::METRICS_SEND]
    );
}

#[test]
fn failed_send_is_retried_next_cycle() {
    let dir = populated_dir();
    let (fake, mut client) = fake_client();
    fake.push_status(routes::LOGS_UPLOAD, 500);
    let mut scanner = Scanner::new(settled(dir.path()));
    let cancel = CancellationToken::new();

    let first = scanner.run(&mut client, &cancel);
    assert_eq!(first.events.failed, 1);
    assert_eq!(first.results.processed, 1);
    assert_eq!(first.usage.processed, 1);
    assert!(!scanner
        .ledger()
        .contains(ReportCategory::Events, "SER_456def_20240301.txt"));

    let second = scanner.run(&mut client, &cancel);
    assert_eq!(second.events.processed, 1);
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 2);
    assert_eq!(fake.count(routes::RESULTS), 1);
}

#[test]
fn malformed_report_does_not_block_others() {
    let dir = populated_dir();
    write(dir.path(), "SRR_456def_broken.xml", "<SampleResultReport><Header>");
    let (fake, mut client) = fake_client();
    let mut scanner = Scanner::new(settled(dir.path()));

    let summary = scanner.run(&mut client, &CancellationToken::new());
    assert_eq!(summary.results.processed, 1);
    assert_eq!(summary.results.failed, 1);
    assert_eq!(fake.count(routes::RESULTS), 1);
    assert_eq!(summary.ledger.results, 1);
}

#[test]
fn empty_event_log_waits_for_content() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "SER_456def_1.txt", "");
    let (fake, mut client) = fake_client();
    let mut scanner = Scanner::new(settled(tmp.path()));
    let cancel = CancellationToken::new();

    assert_eq!(scanner.run(&mut client, &cancel).events.failed, 1);
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 0);

    write(tmp.path(), "SER_456def_1.txt", "boot\n");
    assert_eq!(scanner.run(&mut client, &cancel).events.processed, 1);
}

#[test]
fn static_serial_overrides_event_file_name() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "SER_456def_1.txt", "boot\n");
    let (fake, mut client) = fake_client();
    let mut settings = settled(tmp.path());
    settings.serial_number = Some("CONFIGURED".into());
    let mut scanner = Scanner::new(settings);
    scanner.run(&mut client, &CancellationToken::new());

    let body = fake.bodies(routes::LOGS_UPLOAD).pop().expect("upload");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["SerialNumber"], "CONFIGURED");
    assert_eq!(json["LogName"], "SER_456def_1.txt");
    assert_eq!(json["Payload"], "Ym9vdAo=");
}

#[test]
fn cancelled_cycle_sends_nothing() {
    let dir = populated_dir();
    let (fake, mut client) = fake_client();
    let mut scanner = Scanner::new(settled(dir.path()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = scanner.run(&mut client, &cancel);
    assert!(summary.cancelled);
    assert_eq!(summary.processed(), 0);
    assert!(fake.requests().is_empty());
    assert!(scanner.ledger().is_empty());
}

#[test]
fn synthetic_mode_sends_fixture_instead_of_reports() {
    let dir = populated_dir();
    let (fake, mut client) = fake_client();
    let mut settings = settled(dir.path());
    settings.synthetic_mode = true;
    let mut scanner = Scanner::new(settings);
    let cancel = CancellationToken::new();

    let first = scanner.run(&mut client, &cancel);
    let second = scanner.run(&mut client, &cancel);
    assert_eq!(first.results.processed, 1);
    assert_eq!(second.results.processed, 1);
    assert_eq!(second.events.skipped, 1);
    assert_eq!(fake.count(routes::RESULTS), 2);
    assert_eq!(fake.count(routes::METRICS_SEND), 2);
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 1);

    let body = fake.bodies(routes::RESULTS).pop().expect("results");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["LotNumber"], "Lot A");
    assert_eq!(json["ResultRecords"].as_array().map(Vec::len), Some(5));
}

#[test]
fn persistent_ledger_survives_restart() {
    let dir = populated_dir();
    let state = TempDir::new().unwrap();
    let ledger_path = state.path().join("state").join("ledger.json");
    let cancel = CancellationToken::new();

    let (_, mut client) = fake_client();
    let mut scanner =
        Scanner::new(settled(dir.path())).with_persistent_ledger(&ledger_path);
    assert_eq!(scanner.run(&mut client, &cancel).processed(), 3);
    assert_eq!(Ledger::load(&ledger_path).unwrap().sizes(), scanner.ledger().sizes());

    let (fake, mut client) = fake_client();
    let mut restarted =
        Scanner::new(settled(dir.path())).with_persistent_ledger(&ledger_path);
    assert_eq!(restarted.run(&mut client, &cancel).processed(), 0);
    assert!(fake.requests().is_empty());
}

#[test]
fn event_log_still_being_written_is_sent_whole_once_settled() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("SER_456def_1.txt");
    write(tmp.path(), "SER_456def_1.txt", "line 1\n");
    let (fake, mut client) = fake_client();
    let mut settings = ScanSettings::new(tmp.path());
    settings.settle_window = Duration::from_secs(5);
    let mut scanner = Scanner::new(settings);
    let cancel = CancellationToken::new();

    let first = scanner.run(&mut client, &cancel);
    assert_eq!(first.events.settling, 1);
    assert_eq!(first.events.processed, 0);
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 0);
    assert!(!scanner
        .ledger()
        .contains(ReportCategory::Events, "SER_456def_1.txt"));

    write(tmp.path(), "SER_456def_1.txt", "line 1\nline 2\nline 3\n");
    backdate(&log, 60);
    let second = scanner.run(&mut client, &cancel);
    assert_eq!(second.events.processed, 1);

    let bodies = fake.bodies(routes::LOGS_UPLOAD);
    assert_eq!(bodies.len(), 1);
    let json: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(json["Payload"], "bGluZSAxCmxpbmUgMgpsaW5lIDMK");
}
