//! Canonical resources exchanged with the NeoSync ingestion service.
//!
//! Every resource serializes to the PascalCase JSON the service expects.
//! Optional fields that are absent are omitted from the body, never `null`.
//! Resources are built once per scan cycle and never mutated after
//! construction; [`validate`](ResultReport::validate) is called right before
//! transmission.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// `MessageId` tag of the NeoSync JSON result schema.
pub const NEOSYNC_JSON_RESULT: &str = "NSJ";

/// The only result schema version the service accepts.
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Placeholder for device metadata that is unknown at registration time.
pub const NOT_APPLICABLE: &str = "N/A";

pub const MAX_SEQUENCE_NUMBER: u32 = 1000;
pub const MAX_METRIC_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Instrument serial number, stable per physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(pub String);

impl SerialNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SerialNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SerialNumber {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Shared capability of every payload: it belongs to one device.
pub trait DeviceIdentity {
    fn serial_number(&self) -> &SerialNumber;
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a test was run on a patient sample, a QC sample or for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Patient,
    QualityControl,
    Calibration,
}

impl SampleType {
    /// QC and calibration runs must name the cassette lot.
    pub fn requires_lot_number(self) -> bool {
        !matches!(self, SampleType::Patient)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::Patient => write!(f, "Patient"),
            SampleType::QualityControl => write!(f, "QualityControl"),
            SampleType::Calibration => write!(f, "Calibration"),
        }
    }
}

impl FromStr for SampleType {
    type Err = String;

    /// Accepts the schema names, the instrument's short forms and the
    /// numeric codes (1 = Patient, 2 = QC, 3 = Calibration).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "patient" | "1" => Ok(SampleType::Patient),
            "qualitycontrol" | "qc" | "2" => Ok(SampleType::QualityControl),
            "calibration" | "cal" | "3" => Ok(SampleType::Calibration),
            _ => Err(format!(
                "unknown sample type '{s}'; expected Patient, QualityControl or Calibration"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Device metadata posted to the registration route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInformation {
    pub serial_number: SerialNumber,
    pub firmware_version: String,
    pub software_version: String,
    pub hardware_revision: String,
}

impl DeviceInformation {
    /// Registration predates full device metadata; every version field is
    /// filled with [`NOT_APPLICABLE`].
    pub fn placeholder(serial_number: SerialNumber) -> Self {
        Self {
            serial_number,
            firmware_version: NOT_APPLICABLE.to_string(),
            software_version: NOT_APPLICABLE.to_string(),
            hardware_revision: NOT_APPLICABLE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One target/analyte line of a result report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRecord {
    pub sequence_number: u32,
    pub analyte_name: String,
    /// Numeric value, or one of Positive / Negative / Invalid (patient) and
    /// Passed / Failed (QC, calibration).
    pub test_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range_end: Option<f64>,
    pub test_date: DateTime<FixedOffset>,
}

impl ResultRecord {
    /// Display form of the reference range; `None` for qualitative tests.
    pub fn reference_range(&self) -> Option<String> {
        let start = self.reference_range_start?;
        Some(match self.reference_range_end {
            Some(end) => format!("{start}-{end}"),
            None => start.to_string(),
        })
    }
}

/// A sample-result report in the NeoSync JSON result schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultReport {
    #[serde(default = "default_message_id")]
    pub message_id: String,
    pub version: u32,
    pub message_date: DateTime<FixedOffset>,
    pub serial_number: SerialNumber,
    pub device_id: String,
    pub firmware_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cassette_test_type: Option<String>,
    pub sample_type: SampleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub result_records: Vec<ResultRecord>,
}

fn default_message_id() -> String {
    NEOSYNC_JSON_RESULT.to_string()
}

impl ResultReport {
    /// Check every send-time invariant. Returns the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message_id != NEOSYNC_JSON_RESULT {
            return Err(ValidationError::MissingField { field: "MessageId" });
        }
        if self.version != RESULT_SCHEMA_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                version: self.version,
            });
        }
        require("SerialNumber", self.serial_number.as_str())?;
        require("DeviceId", &self.device_id)?;
        require("FirmwareVersion", &self.firmware_version)?;
        if is_unset(&self.message_date) {
            return Err(ValidationError::UnsetDate {
                field: "MessageDate",
            });
        }

        let lot_missing = self
            .lot_number
            .as_deref()
            .map(|lot| lot.trim().is_empty())
            .unwrap_or(true);
        if self.sample_type.requires_lot_number() && lot_missing {
            return Err(ValidationError::LotNumberRequired {
                sample_type: self.sample_type,
            });
        }

        let mut seen = HashSet::new();
        for record in &self.result_records {
            if record.sequence_number == 0 || record.sequence_number > MAX_SEQUENCE_NUMBER {
                return Err(ValidationError::SequenceOutOfRange {
                    sequence: record.sequence_number,
                });
            }
            if !seen.insert(record.sequence_number) {
                return Err(ValidationError::DuplicateSequence {
                    sequence: record.sequence_number,
                });
            }
            require("AnalyteName", &record.analyte_name)?;
            require("TestValue", &record.test_value)?;
            if is_unset(&record.test_date) {
                return Err(ValidationError::UnsetDate { field: "TestDate" });
            }
        }
        Ok(())
    }
}

impl DeviceIdentity for ResultReport {
    fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A point-in-time device metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<FixedOffset>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricsReport {
    pub serial_number: SerialNumber,
    pub metrics: Vec<Metric>,
}

impl MetricsReport {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("SerialNumber", self.serial_number.as_str())?;
        if self.metrics.is_empty() {
            return Err(ValidationError::EmptyMetrics {
                serial: self.serial_number.to_string(),
            });
        }
        for metric in &self.metrics {
            require("Name", &metric.name)?;
            let len = metric.name.chars().count();
            if len > MAX_METRIC_NAME_LEN {
                return Err(ValidationError::MetricNameTooLong { len });
            }
            if is_unset(&metric.timestamp) {
                return Err(ValidationError::UnsetDate { field: "Timestamp" });
            }
        }
        Ok(())
    }

    /// Look up a metric value by name.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }
}

impl DeviceIdentity for MetricsReport {
    fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// A raw instrument log file; `payload` holds the file bytes in base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogFile {
    pub serial_number: SerialNumber,
    pub log_name: String,
    pub payload: String,
}

impl LogFile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("SerialNumber", self.serial_number.as_str())?;
        require("LogName", &self.log_name)?;
        require("Payload", &self.payload)
    }
}

impl DeviceIdentity for LogFile {
    fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}

/// The epoch and year-1 timestamps are what a never-assigned date looks like.
fn is_unset(date: &DateTime<FixedOffset>) -> bool {
    date.timestamp() == 0 || date.year() <= 1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("rfc3339")
    }

    #[test]
    fn serial_number_display() {
        assert_eq!(SerialNumber::from("456def").to_string(), "456def");
    }

    #[test]
    fn sample_type_parses_short_and_numeric_forms() {
        assert_eq!("QC".parse::<SampleType>(), Ok(SampleType::QualityControl));
        assert_eq!(
            "Quality Control".parse::<SampleType>(),
            Ok(SampleType::QualityControl)
        );
        assert_eq!("3".parse::<SampleType>(), Ok(SampleType::Calibration));
        assert_eq!("patient".parse::<SampleType>(), Ok(SampleType::Patient));
        assert!("blood".parse::<SampleType>().is_err());
    }

    #[test]
    fn reference_range_display_forms() {
        let mut record = ResultRecord {
            sequence_number: 1,
            analyte_name: "SARS".into(),
            test_value: "12.56".into(),
            test_units: Some("ug".into()),
            reference_range_start: None,
            reference_range_end: None,
            test_date: date("2022-02-25T04:08:49+00:00"),
        };
        assert_eq!(record.reference_range(), None);

        record.reference_range_start = Some(11.0);
        assert_eq!(record.reference_range().as_deref(), Some("11"));

        record.reference_range_end = Some(15.5);
        assert_eq!(record.reference_range().as_deref(), Some("11-15.5"));
    }

    #[test]
    fn epoch_counts_as_unset() {
        assert!(is_unset(&date("1970-01-01T00:00:00+00:00")));
        assert!(!is_unset(&date("2024-06-01T10:00:00+02:00")));
    }

    #[test]
    fn placeholder_device_information_uses_not_applicable() {
        let info = DeviceInformation::placeholder("SN1".into());
        assert_eq!(info.firmware_version, NOT_APPLICABLE);
        assert_eq!(info.software_version, NOT_APPLICABLE);
        assert_eq!(info.hardware_revision, NOT_APPLICABLE);
    }
}
