//! `SRR_*.xml` sample-result report → [`ResultReport`].
//!
//! ```xml
//! <SampleResultReport>
//!   <Header>
//!     <Serial_Number>456def</Serial_Number>
//!     <Firmware_Version>1.5.3</Firmware_Version>
//!     <Sample_Type>QC</Sample_Type>
//!     <Lot_Number>Lot A</Lot_Number>
//!     <Location>San Francisco Lab</Location>
//!     <Cassette_Test_Type>Sample 1</Cassette_Test_Type>
//!     <Assay>Assay LDT</Assay>
//!     <Assay_Version>1.1</Assay_Version>
//!     <Assay_Classification>LDT</Assay_Classification>
//!     <Test_Date>03/01/2024 09:15</Test_Date>
//!   </Header>
//!   <TargetRecords>
//!     <TargetRecord>
//!       <Target>Target 1</Target>
//!       <Result>Negative</Result>
//!     </TargetRecord>
//!   </TargetRecords>
//! </SampleResultReport>
//! ```

use neolink_core::{
    types::{NEOSYNC_JSON_RESULT, RESULT_SCHEMA_VERSION},
    ResultRecord, ResultReport, SampleType, SerialNumber,
};

use crate::error::ParseError;
use crate::markup::{Fields, ReportDocument};
use crate::values::{is_no_lot, normalize_test_value, parse_number, parse_report_date};
use crate::ParseContext;

/// Element holding one `<TargetRecord>` per target.
pub const RECORD_CONTAINER: &str = "TargetRecords";

/// Parse a whole sample-result report file.
pub fn parse_result_report(content: &str, ctx: &ParseContext) -> Result<ResultReport, ParseError> {
    let doc = ReportDocument::parse(content, RECORD_CONTAINER)?;
    result_report_from_fields(&doc.header, &doc.records, ctx)
}

/// Build a [`ResultReport`] from header fields and one field set per target.
///
/// Sequence numbers are assigned 1, 2, … in record order. Every record needs
/// a test date, either its own `Test_Date` or the header's.
pub fn result_report_from_fields(
    header: &Fields,
    targets: &[Fields],
    ctx: &ParseContext,
) -> Result<ResultReport, ParseError> {
    let serial = resolve_serial(header, ctx)?;
    let sample_type = header
        .require("Sample_Type")?
        .parse::<SampleType>()
        .map_err(|_| ParseError::InvalidValue {
            field: "Sample_Type".into(),
            value: header.get("Sample_Type").unwrap_or_default().into(),
        })?;

    if targets.is_empty() {
        return Err(ParseError::MissingElement {
            element: RECORD_CONTAINER,
        });
    }

    let header_date = header
        .get("Test_Date")
        .map(|v| parse_report_date("Test_Date", v))
        .transpose()?;
    let assay = assay_label(header);

    let mut result_records = Vec::with_capacity(targets.len());
    let mut sequence = 1u32;
    for target in targets {
        result_records.push(result_record(target, sequence, assay.as_deref(), header_date)?);
        sequence += 1;
    }

    let report = ResultReport {
        message_id: NEOSYNC_JSON_RESULT.to_string(),
        version: RESULT_SCHEMA_VERSION,
        message_date: ctx.observed_at,
        device_id: header
            .get("Device_Id")
            .map(str::to_string)
            .unwrap_or_else(|| serial.to_string()),
        serial_number: serial,
        firmware_version: header.require("Firmware_Version")?.to_string(),
        cassette_test_type: header.get("Cassette_Test_Type").map(str::to_string),
        sample_type,
        lot_number: header
            .get("Lot_Number")
            .filter(|lot| !is_no_lot(Some(*lot)))
            .map(str::to_string),
        location_name: header.get("Location").map(str::to_string),
        result_records,
    };
    report.validate()?;
    Ok(report)
}

fn result_record(
    target: &Fields,
    sequence_number: u32,
    assay: Option<&str>,
    header_date: Option<chrono::DateTime<chrono::FixedOffset>>,
) -> Result<ResultRecord, ParseError> {
    let analyte_name = target
        .get("Analyte")
        .or(assay)
        .ok_or_else(|| ParseError::MissingField {
            field: "Assay".into(),
        })?
        .to_string();
    let test_value = normalize_test_value("Result", target.require("Result")?)?;
    let test_date = match target.get("Test_Date") {
        Some(v) => parse_report_date("Test_Date", v)?,
        None => header_date.ok_or_else(|| ParseError::MissingField {
            field: "Test_Date".into(),
        })?,
    };

    let quantitative = parse_number("Result", &test_value).is_ok();
    let (reference_range_start, reference_range_end) = if quantitative {
        let start = target
            .get("Range_Start")
            .map(|v| parse_number("Range_Start", v))
            .transpose()?;
        let end = target
            .get("Range_End")
            .map(|v| parse_number("Range_End", v))
            .transpose()?;
        if start.is_none() && end.is_some() {
            return Err(ParseError::InvalidValue {
                field: "Range_End".into(),
                value: target.get("Range_End").unwrap_or_default().into(),
            });
        }
        (start, end)
    } else {
        (None, None)
    };

    Ok(ResultRecord {
        sequence_number,
        analyte_name,
        test_value,
        test_units: target
            .get("Units")
            .or_else(|| target.get("Target"))
            .map(str::to_string),
        reference_range_start,
        reference_range_end,
        test_date,
    })
}

/// `"<Assay> (<Assay_Version> / <Assay_Classification>)"`, degrading
/// gracefully when version or classification is absent.
fn assay_label(header: &Fields) -> Option<String> {
    let name = header.get("Assay")?;
    Some(
        match (header.get("Assay_Version"), header.get("Assay_Classification")) {
            (Some(version), Some(class)) => format!("{name} ({version} / {class})"),
            (Some(version), None) => format!("{name} ({version})"),
            (None, Some(class)) => format!("{name} ({class})"),
            (None, None) => name.to_string(),
        },
    )
}

pub(crate) fn resolve_serial(header: &Fields, ctx: &ParseContext) -> Result<SerialNumber, ParseError> {
    header
        .get("Serial_Number")
        .map(SerialNumber::from)
        .or_else(|| ctx.serial_number.clone())
        .ok_or_else(|| ParseError::MissingField {
            field: "Serial_Number".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Timelike};

    fn ctx() -> ParseContext {
        ParseContext::new(
            None,
            DateTime::parse_from_rfc3339("2024-03-01T10:00:00+00:00").expect("date"),
        )
    }

    fn header(pairs: &[(&str, &str)]) -> Fields {
        Fields::from_pairs(pairs.iter().copied())
    }

    fn qc_header() -> Fields {
        header(&[
            ("Serial_Number", "456def"),
            ("Firmware_Version", "1.5.3"),
            ("Sample_Type", "QC"),
            ("Lot_Number", "Lot A"),
            ("Assay", "Assay LDT"),
            ("Assay_Version", "1.1"),
            ("Assay_Classification", "LDT"),
            ("Test_Date", "03/01/2024 09:15"),
        ])
    }

    #[test]
    fn sequences_increment_from_one() {
        let targets: Vec<Fields> = (1..=3)
            .map(|i| {
                Fields::from_pairs([("Target", format!("Target {i}")), ("Result", "Negative".into())])
            })
            .collect();
        let report = result_report_from_fields(&qc_header(), &targets, &ctx()).expect("report");
        let seqs: Vec<u32> = report.result_records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(report.result_records[0].analyte_name, "Assay LDT (1.1 / LDT)");
        assert_eq!(report.result_records[2].test_units.as_deref(), Some("Target 3"));
        assert_eq!(report.result_records[0].test_date.naive_local().hour(), 9);
        assert_eq!(report.device_id, "456def");
    }

    #[test]
    fn qualitative_results_drop_reference_ranges() {
        let targets = vec![header(&[
            ("Target", "Flu A"),
            ("Result", "positive"),
            ("Range_Start", "1"),
        ])];
        let report = result_report_from_fields(&qc_header(), &targets, &ctx()).expect("report");
        let record = &report.result_records[0];
        assert_eq!(record.test_value, "Positive");
        assert_eq!(record.reference_range(), None);
    }

    #[test]
    fn quantitative_results_keep_ranges() {
        let targets = vec![header(&[
            ("Target", "CRP"),
            ("Result", "12.56"),
            ("Units", "mg/L"),
            ("Range_Start", "11.00"),
            ("Range_End", "15.00"),
        ])];
        let report = result_report_from_fields(&qc_header(), &targets, &ctx()).expect("report");
        let record = &report.result_records[0];
        assert_eq!(record.test_units.as_deref(), Some("mg/L"));
        assert_eq!(record.reference_range().as_deref(), Some("11-15"));
    }

    #[test]
    fn no_lot_marker_on_qc_fails_validation() {
        let mut pairs: Vec<(&str, &str)> = vec![
            ("Serial_Number", "456def"),
            ("Firmware_Version", "1.5.3"),
            ("Sample_Type", "Calibration"),
            ("Lot_Number", "--"),
            ("Assay", "Assay LDT"),
            ("Test_Date", "03/01/2024 09:15"),
        ];
        let targets = vec![header(&[("Result", "Passed")])];
        let err = result_report_from_fields(&header(&pairs), &targets, &ctx()).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)), "got: {err}");

        pairs[2] = ("Sample_Type", "Patient");
        let report = result_report_from_fields(&header(&pairs), &targets, &ctx()).expect("patient");
        assert_eq!(report.lot_number, None);
    }

    #[test]
    fn missing_test_date_is_a_parse_error() {
        let pairs = [
            ("Serial_Number", "456def"),
            ("Firmware_Version", "1.5.3"),
            ("Sample_Type", "Patient"),
            ("Assay", "Assay LDT"),
        ];
        let targets = vec![header(&[("Result", "Negative")])];
        let err = result_report_from_fields(&header(&pairs), &targets, &ctx()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { ref field } if field == "Test_Date"));
    }

    #[test]
    fn serial_falls_back_to_context() {
        let pairs = [
            ("Firmware_Version", "1.5.3"),
            ("Sample_Type", "Patient"),
            ("Assay", "Assay LDT"),
            ("Test_Date", "03/01/2024 09:15"),
        ];
        let targets = vec![header(&[("Result", "Negative")])];
        let mut context = ctx();
        assert!(result_report_from_fields(&header(&pairs), &targets, &context).is_err());

        context.serial_number = Some("SN777".into());
        let report = result_report_from_fields(&header(&pairs), &targets, &context).expect("report");
        assert_eq!(report.serial_number.as_str(), "SN777");
    }
}
