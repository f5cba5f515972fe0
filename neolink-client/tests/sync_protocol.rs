use chrono::DateTime;
use neolink_client::routes;
use neolink_client::testing::FakeTransport;
use neolink_client::{ClientError, SyncClient};
use neolink_core::{
    LogFile, Metric, MetricsReport, ResultRecord, ResultReport, SampleType, SerialNumber,
};
use rstest::rstest;

fn metrics(serial: &str) -> MetricsReport {
    let ts = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+00:00").expect("date");
    MetricsReport {
        serial_number: serial.into(),
        metrics: vec![
            Metric::new("Overall Total Tests", 15.0, ts),
            Metric::new("Overall Success Rate", 100.0, ts),
        ],
    }
}

fn results(serial: &str) -> ResultReport {
    let ts = DateTime::parse_from_rfc3339("2024-03-01T09:15:00-08:00").expect("date");
    ResultReport {
        message_id: "NSJ".into(),
        version: 1,
        message_date: ts,
        serial_number: serial.into(),
        device_id: serial.into(),
        firmware_version: "1.5.3".into(),
        cassette_test_type: Some("Sample 1".into()),
        sample_type: SampleType::QualityControl,
        lot_number: Some("Lot A".into()),
        location_name: None,
        result_records: vec![ResultRecord {
            sequence_number: 1,
            analyte_name: "Assay LDT (1.1 / LDT)".into(),
            test_value: "Negative".into(),
            test_units: Some("Target 1".into()),
            reference_range_start: None,
            reference_range_end: None,
            test_date: ts,
        }],
    }
}

#[test]
fn two_sends_for_one_serial_register_once() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());

    client.send_metrics(&metrics("456def")).expect("first");
    client.send_metrics(&metrics("456def")).expect("second");

    assert_eq!(fake.count(routes::REGISTER), 1);
    assert_eq!(fake.count(routes::METRICS_SEND), 2);
    assert!(client.is_registered(&SerialNumber::from("456def")));
    let bearers: Vec<_> = fake
        .requests()
        .into_iter()
        .filter(|r| r.route == routes::METRICS_SEND)
        .map(|r| r.bearer)
        .collect();
    assert_eq!(bearers, vec![Some("token-1".into()), Some("token-1".into())]);
}

#[test]
fn a_new_serial_triggers_registration() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());

    client.send_metrics(&metrics("456def")).expect("first device");
    client.send_metrics(&metrics("789ghi")).expect("second device");

    assert_eq!(fake.count(routes::REGISTER), 2);
    let last = fake.requests().pop().expect("request");
    assert_eq!(last.bearer.as_deref(), Some("token-2"));
}

#[test]
fn rejected_token_is_refreshed_and_the_send_retried_once() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    fake.push_status(routes::RESULTS, 401);

    client.send_results(&results("456def")).expect("retried send");

    assert_eq!(fake.count(routes::REGISTER), 2);
    assert_eq!(fake.count(routes::RESULTS), 2);
    let sends: Vec<_> = fake
        .requests()
        .into_iter()
        .filter(|r| r.route == routes::RESULTS)
        .collect();
    assert_eq!(sends[0].bearer.as_deref(), Some("token-1"));
    assert_eq!(sends[1].bearer.as_deref(), Some("token-2"));
    assert_eq!(sends[0].body, sends[1].body);
}

#[test]
fn second_rejection_fails_without_a_third_attempt() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    fake.push_status(routes::LOGS_UPLOAD, 401)
        .push_status(routes::LOGS_UPLOAD, 401);

    let log = LogFile {
        serial_number: "456def".into(),
        log_name: "SER_456def_20240301.txt".into(),
        payload: "bG9n".into(),
    };
    let err = client.upload_log(&log).unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized { .. }), "got: {err}");
    assert_eq!(fake.count(routes::LOGS_UPLOAD), 2);
    assert_eq!(fake.count(routes::REGISTER), 2);
    assert!(!client.has_token());
}

#[test]
fn failed_registration_sends_nothing() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    fake.push_status(routes::REGISTER, 500);

    let err = client.send_metrics(&metrics("456def")).unwrap_err();
    assert!(matches!(err, ClientError::Registration { ref serial, .. } if serial == "456def"));
    assert_eq!(fake.count(routes::METRICS_SEND), 0);
    assert!(!client.is_registered(&SerialNumber::from("456def")));

    client.send_metrics(&metrics("456def")).expect("recovers next time");
    assert_eq!(fake.count(routes::REGISTER), 2);
}

#[test]
fn non_auth_failures_are_not_retried() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    fake.push_status(routes::METRICS_SEND, 500);

    let err = client.send_metrics(&metrics("456def")).unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 500, .. }));
    assert_eq!(fake.count(routes::METRICS_SEND), 1);

    fake.push_transport_error(routes::METRICS_SEND, "timed out");
    let err = client.send_metrics(&metrics("456def")).unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(fake.count(routes::REGISTER), 1);
}

#[rstest]
#[case(400)]
#[case(403)]
#[case(404)]
#[case(503)]
fn other_statuses_surface_once(#[case] status: u16) {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    fake.push_status(routes::RESULTS, status);

    let err = client.send_results(&results("456def")).unwrap_err();
    assert!(matches!(err, ClientError::Status { status: s, .. } if s == status));
    assert_eq!(fake.count(routes::RESULTS), 1);
    assert!(client.has_token());
}

#[test]
fn result_body_uses_service_property_names() {
    let fake = FakeTransport::new();
    let mut client = SyncClient::new(fake.clone());
    client.send_results(&results("456def")).expect("send");

    let body = fake.bodies(routes::RESULTS).pop().expect("body");
    let json: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["MessageId"], "NSJ");
    assert_eq!(json["SerialNumber"], "456def");
    assert_eq!(json["SampleType"], "QualityControl");
    assert_eq!(json["ResultRecords"][0]["SequenceNumber"], 1);
    assert!(json.get("LocationName").is_none());
}
