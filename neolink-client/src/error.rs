//! Error types for neolink-client.

use neolink_core::ValidationError;
use thiserror::Error;

/// Failures of a single client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The payload breaks a send-time invariant; nothing was sent.
    #[error("payload rejected before send: {0}")]
    Validation(#[from] ValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The registration call itself failed; no token could be obtained.
    #[error("registration of device {serial} failed: {reason}")]
    Registration { serial: String, reason: String },

    /// Still 401 after one re-registration and retry.
    #[error("{route} rejected the device token twice")]
    Unauthorized { route: &'static str },

    /// Non-success status other than 401.
    #[error("{route} returned HTTP {status}: {body}")]
    Status {
        route: &'static str,
        status: u16,
        body: String,
    },

    /// Connection failure, timeout, or unreadable response.
    #[error("transport error on {route}: {message}")]
    Transport {
        route: &'static str,
        message: String,
    },
}
