//! `SUR_*.xml` system-usage report → [`MetricsReport`].
//!
//! Header counters map onto fixed metric names:
//!
//! | Header field | Metric | Required |
//! |---|---|---|
//! | `System_Uptime_Hours` | System Uptime Hours | no |
//! | `Cumulative_Testing_Days` | Cumulative Testing Days | no |
//! | `Total_Tests` | Overall Total Tests | yes |
//! | `Complete` | Overall Passed Tests | yes |
//! | `Failed` | Overall Failed Tests | yes |
//! | `Success_Rate` | Overall Success Rate | yes |
//! | `Instrument_Errors` | Instrument Errors | no |
//!
//! Metrics are stamped with the header's `Report_Date`, or with the moment
//! the report was picked up when the header has none.

use neolink_core::{Metric, MetricsReport};

use crate::error::ParseError;
use crate::markup::{Fields, ReportDocument};
use crate::results::resolve_serial;
use crate::values::{is_no_lot, parse_number, parse_percentage, parse_report_date};
use crate::ParseContext;

/// Element holding one `<AssayRecord>` per assay run on the instrument.
pub const RECORD_CONTAINER: &str = "AssayRecords";

const COUNTERS: [(&str, &str, bool); 5] = [
    ("System_Uptime_Hours", "System Uptime Hours", false),
    ("Cumulative_Testing_Days", "Cumulative Testing Days", false),
    ("Total_Tests", "Overall Total Tests", true),
    ("Complete", "Overall Passed Tests", true),
    ("Failed", "Overall Failed Tests", true),
];

/// Parse a whole system-usage report file.
pub fn parse_usage_report(content: &str, ctx: &ParseContext) -> Result<MetricsReport, ParseError> {
    let doc = ReportDocument::parse(content, RECORD_CONTAINER)?;
    metrics_from_fields(&doc.header, &doc.records, ctx)
}

/// Build a [`MetricsReport`] from usage header fields and assay records.
pub fn metrics_from_fields(
    header: &Fields,
    assays: &[Fields],
    ctx: &ParseContext,
) -> Result<MetricsReport, ParseError> {
    let serial_number = resolve_serial(header, ctx)?;
    let timestamp = match header.get("Report_Date") {
        Some(v) => parse_report_date("Report_Date", v)?,
        None => ctx.observed_at,
    };

    let mut metrics = Vec::with_capacity(COUNTERS.len() + 2 + assays.len());
    for (field, name, required) in COUNTERS {
        let raw = if required {
            Some(header.require(field)?)
        } else {
            header.get(field)
        };
        if let Some(raw) = raw {
            metrics.push(Metric::new(name, parse_number(field, raw)?, timestamp));
        }
    }

    let success_rate = parse_percentage("Success_Rate", header.require("Success_Rate")?)?;
    metrics.push(Metric::new("Overall Success Rate", success_rate, timestamp));

    if let Some(raw) = header.get("Instrument_Errors") {
        metrics.push(Metric::new(
            "Instrument Errors",
            parse_number("Instrument_Errors", raw)?,
            timestamp,
        ));
    }

    if ctx.assay_success_rates {
        for assay in assays.iter().filter(|a| is_no_lot(a.get("Lot_Number"))) {
            let name = assay.require("Assay")?;
            let rate = match assay.get("Success_Rate") {
                Some(raw) => parse_percentage("Success_Rate", raw)?,
                None => success_rate,
            };
            metrics.push(Metric::new(format!("{name} Success Rate"), rate, timestamp));
        }
    }

    let report = MetricsReport {
        serial_number,
        metrics,
    };
    report.validate()?;
    Ok(report)
}
