//! HTTP seam between [`SyncClient`](crate::SyncClient) and the network.
//!
//! The client only needs "send this request, give me status and body";
//! anything richer stays inside the transport. Non-success statuses are
//! returned as responses, not errors, so the client can react to 401.

use std::fmt;
use std::time::Duration;

use neolink_core::NeoSyncConfig;

use crate::error::ClientError;
use crate::routes::{SITE_CODE_HEADER, VENDOR_KEY_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// One request against a route relative to the service base URL.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub route: &'static str,
    /// JSON body (POST only).
    pub body: Option<&'a str>,
    /// Bearer token for authenticated routes.
    pub bearer: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes requests. Implementations attach the static `Vendor-Key` and
/// `Site-Code` headers to every request.
pub trait Transport {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, ClientError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, ClientError> {
        (**self).execute(request)
    }
}

/// Blocking transport over a shared `ureq` agent (connection pool, timeout).
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    vendor_key: String,
    site_code: String,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("base_url", &self.base_url)
            .field("site_code", &self.site_code)
            .finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(config: &NeoSyncConfig, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("neolink/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: config.url.trim_end_matches('/').to_string(),
            vendor_key: config.vendor_key.clone(),
            site_code: config.site_code.clone(),
        }
    }

    pub fn url_for(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, ClientError> {
        let url = self.url_for(request.route);
        let mut call = self
            .agent
            .request(&request.method.to_string(), &url)
            .set(VENDOR_KEY_HEADER, &self.vendor_key)
            .set(SITE_CODE_HEADER, &self.site_code)
            .set("Accept", "application/json");
        if let Some(token) = request.bearer {
            call = call.set("Authorization", &format!("Bearer {token}"));
        }

        let outcome = match request.body {
            Some(body) => call
                .set("Content-Type", "application/json; charset=utf-8")
                .send_string(body),
            None => call.call(),
        };

        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(ClientError::Transport {
                    route: request.route,
                    message: err.to_string(),
                })
            }
        };

        let status = response.status();
        let body = response.into_string().map_err(|err| ClientError::Transport {
            route: request.route,
            message: format!("failed to read response body: {err}"),
        })?;
        Ok(HttpResponse { status, body })
    }
}
