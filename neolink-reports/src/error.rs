//! Error types for neolink-reports.

use neolink_core::ValidationError;
use thiserror::Error;

/// A report file that cannot be turned into a complete resource.
///
/// The scanner leaves such files unmarked so they are retried next cycle.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file is not well-formed markup.
    #[error("malformed report markup: {0}")]
    Markup(#[from] roxmltree::Error),

    #[error("report has no <{element}> element")]
    MissingElement { element: &'static str },

    #[error("required field `{field}` is missing or empty")]
    MissingField { field: String },

    #[error("field `{field}` is not a number: '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("field `{field}` is not a MM/dd/yyyy HH:mm date: '{value}'")]
    InvalidDate { field: String, value: String },

    #[error("field `{field}` has unsupported value '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("cannot derive a serial number from file name '{name}'")]
    SerialNotInFileName { name: String },

    /// Parsed fine but the resulting resource breaks a send-time invariant.
    #[error("report fails validation: {0}")]
    Invalid(#[from] ValidationError),
}
