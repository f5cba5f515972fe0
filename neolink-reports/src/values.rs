//! Culture-invariant scalar parsing shared by the report parsers.

use chrono::{DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeZone};

use crate::error::ParseError;

/// Fixed instrument date pattern (`MM/dd/yyyy HH:mm`).
pub const REPORT_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Lot-number value the instrument writes when a record has no lot.
pub const NO_LOT_MARKER: &str = "--";

/// Qualitative test values accepted besides numbers.
pub const QUALITATIVE_VALUES: [&str; 5] = ["Positive", "Negative", "Invalid", "Passed", "Failed"];

/// Parse a plain decimal (`.` separator, no grouping).
pub fn parse_number(field: &str, value: &str) -> Result<f64, ParseError> {
    let trimmed = value.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Parse a percentage such as `"97.5%"`; the trailing `%` is optional.
pub fn parse_percentage(field: &str, value: &str) -> Result<f64, ParseError> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed);
    parse_number(field, number).map_err(|_| ParseError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a `MM/dd/yyyy HH:mm` date in the agent host's local time zone.
pub fn parse_report_date(field: &str, value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    parse_report_date_in(field, value, &Local)
}

/// [`parse_report_date`] with an explicit time zone.
pub fn parse_report_date_in<Tz: TimeZone>(
    field: &str,
    value: &str,
    tz: &Tz,
) -> Result<DateTime<FixedOffset>, ParseError> {
    let invalid = || ParseError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };
    let naive = NaiveDateTime::parse_from_str(value.trim(), REPORT_DATE_FORMAT).map_err(|_| invalid())?;
    resolve_local(tz, &naive).ok_or_else(invalid)
}

/// Pin a wall-clock time to `tz`. Ambiguous times take the earlier instant;
/// times inside a spring-forward gap keep the offset in force before it.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.fixed_offset()),
        LocalResult::None => {
            let before = tz
                .offset_from_local_datetime(&(*naive - Duration::days(1)))
                .earliest()?
                .fix();
            before.from_local_datetime(naive).single()
        }
    }
}

/// Normalize a test value: numbers pass through unchanged, qualitative
/// values get their canonical casing, anything else is rejected.
pub fn normalize_test_value(field: &str, value: &str) -> Result<String, ParseError> {
    let trimmed = value.trim();
    if parse_number(field, trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }
    QUALITATIVE_VALUES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(trimmed))
        .map(|known| known.to_string())
        .ok_or_else(|| ParseError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// `true` for the no-lot marker (`--`) and its spelled-out form `none`.
pub fn is_no_lot(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) => v == NO_LOT_MARKER || v.eq_ignore_ascii_case("none"),
        None => false,
    }
}
