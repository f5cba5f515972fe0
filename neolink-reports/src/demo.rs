//! Demonstration fixture for synthetic mode.
//!
//! Builds the same fixed result and metrics payloads on every call,
//! independent of any file on disk. Used only when `synthetic_mode` is
//! switched on, to exercise a NeoSync tenant end to end.

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use neolink_core::{
    types::{NEOSYNC_JSON_RESULT, RESULT_SCHEMA_VERSION},
    Metric, MetricsReport, ResultRecord, ResultReport, SampleType, SerialNumber,
};

/// Serial the fixture reports under when no static serial is configured.
pub const DEMO_SERIAL: &str = "456def";

const DEMO_ASSAY: &str = "Assay LDT (1.1 / LDT)";
const DEMO_TARGETS: u32 = 5;

/// A QC result with five negative targets of one lab-developed assay,
/// tested one hour before `now`.
pub fn demo_result_report(serial: &SerialNumber, now: DateTime<FixedOffset>) -> ResultReport {
    let tested_at = now - Duration::hours(1);
    let result_records = (1..=DEMO_TARGETS)
        .map(|sequence_number| ResultRecord {
            sequence_number,
            analyte_name: DEMO_ASSAY.to_string(),
            test_value: "Negative".to_string(),
            test_units: Some(format!("Target {sequence_number}")),
            reference_range_start: None,
            reference_range_end: None,
            test_date: tested_at,
        })
        .collect();

    ResultReport {
        message_id: NEOSYNC_JSON_RESULT.to_string(),
        version: RESULT_SCHEMA_VERSION,
        message_date: now,
        serial_number: serial.clone(),
        device_id: serial.to_string(),
        firmware_version: "1.5.3".to_string(),
        cassette_test_type: Some("Sample 1".to_string()),
        sample_type: SampleType::QualityControl,
        lot_number: Some("Lot A".to_string()),
        location_name: Some("San Francisco Lab".to_string()),
        result_records,
    }
}

/// Fixed usage counters stamped with `now` truncated to the minute.
pub fn demo_metrics_report(serial: &SerialNumber, now: DateTime<FixedOffset>) -> MetricsReport {
    let timestamp = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let metrics = [
        ("System Uptime Hours", 5.0),
        ("Cumulative Testing Days", 6.0),
        ("Overall Total Tests", 15.0),
        ("Overall Passed Tests", 15.0),
        ("Overall Failed Tests", 0.0),
        ("Overall Success Rate", 100.0),
        ("Instrument Errors", 1.0),
        ("Widget 1 RPMs", 2000.0),
        ("Pipette 1000ml Fills", 2346.0),
        ("Feature X Activated # times", 3.0),
    ]
    .into_iter()
    .map(|(name, value)| Metric::new(name, value, timestamp))
    .collect();

    MetricsReport {
        serial_number: serial.clone(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T10:42:17+01:00").expect("date")
    }

    #[test]
    fn demo_result_is_valid() {
        let report = demo_result_report(&"456def".into(), now());
        report.validate().expect("valid");
        assert_eq!(report.result_records.len(), 5);
        assert_eq!(report.result_records[4].sequence_number, 5);
    }

    #[test]
    fn demo_metrics_are_minute_aligned() {
        let report = demo_metrics_report(&"456def".into(), now());
        report.validate().expect("valid");
        assert_eq!(report.metrics[0].timestamp.to_rfc3339(), "2024-03-01T10:42:00+01:00");
        assert_eq!(report.value_of("Overall Success Rate"), Some(100.0));
    }
}
