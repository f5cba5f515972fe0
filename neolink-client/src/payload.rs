//! The closed set of payloads the client delivers.

use neolink_core::{
    DeviceIdentity, LogFile, MetricsReport, ResultReport, SerialNumber, ValidationError,
};

use crate::routes;

/// One business payload, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Results(&'a ResultReport),
    Metrics(&'a MetricsReport),
    Log(&'a LogFile),
}

impl<'a> Payload<'a> {
    pub fn serial_number(&self) -> &'a SerialNumber {
        match self {
            Payload::Results(r) => r.serial_number(),
            Payload::Metrics(m) => m.serial_number(),
            Payload::Log(l) => l.serial_number(),
        }
    }

    /// Route the payload is POSTed to.
    pub fn route(&self) -> &'static str {
        match self {
            Payload::Results(_) => routes::RESULTS,
            Payload::Metrics(_) => routes::METRICS_SEND,
            Payload::Log(_) => routes::LOGS_UPLOAD,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Results(_) => "results",
            Payload::Metrics(_) => "metrics",
            Payload::Log(_) => "log",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Payload::Results(r) => r.validate(),
            Payload::Metrics(m) => m.validate(),
            Payload::Log(l) => l.validate(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Payload::Results(r) => serde_json::to_string(r),
            Payload::Metrics(m) => serde_json::to_string(m),
            Payload::Log(l) => serde_json::to_string(l),
        }
    }
}
