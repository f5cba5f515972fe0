//! # neolink-client
//!
//! Synchronization client for the NeoSync ingestion service.
//!
//! [`SyncClient`] owns the HTTP [`Transport`], the client-wide bearer token
//! and the set of serials known to be registered. Every business call is
//! wrapped in the same protocol: register if needed, send, and on a 401
//! re-register and retry exactly once.

pub mod client;
pub mod error;
pub mod payload;
pub mod routes;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use client::SyncClient;
pub use error::ClientError;
pub use payload::Payload;
pub use transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
