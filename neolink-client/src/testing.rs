//! In-memory [`Transport`] for exercising the client without a network.
//!
//! Built only for this crate's tests and behind the `testing` feature,
//! which downstream crates enable from `[dev-dependencies]`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ClientError;
use crate::routes;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

/// A request as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub route: &'static str,
    pub bearer: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct State {
    requests: Vec<RecordedRequest>,
    scripted: HashMap<&'static str, VecDeque<Scripted>>,
    tokens_issued: usize,
}

/// Cloneable handle; every clone shares the same recorded state.
///
/// Unscripted calls succeed: the registration route answers with a fresh
/// `{"AuthToken":"token-N"}`, every other route with `200 {}`. Scripted
/// outcomes are consumed per route in push order before the defaults apply.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded requests.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a response with `status` and an empty JSON body for `route`.
    pub fn push_status(&self, route: &'static str, status: u16) -> &Self {
        self.push_response(route, status, "{}")
    }

    pub fn push_response(&self, route: &'static str, status: u16, body: &str) -> &Self {
        self.lock()
            .scripted
            .entry(route)
            .or_default()
            .push_back(Scripted::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }));
        self
    }

    /// Queue a connection-level failure for `route`.
    pub fn push_transport_error(&self, route: &'static str, message: &str) -> &Self {
        self.lock()
            .scripted
            .entry(route)
            .or_default()
            .push_back(Scripted::Fail(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests made against `route`.
    pub fn count(&self, route: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.route == route)
            .count()
    }

    /// Bodies POSTed to `route`, in order.
    pub fn bodies(&self, route: &str) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.route == route)
            .filter_map(|r| r.body.clone())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, ClientError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method: request.method,
            route: request.route,
            bearer: request.bearer.map(str::to_string),
            body: request.body.map(str::to_string),
        });

        let scripted = state
            .scripted
            .get_mut(request.route)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(ClientError::Transport {
                route: request.route,
                message,
            }),
            None if request.route == routes::REGISTER => {
                state.tokens_issued += 1;
                Ok(HttpResponse {
                    status: 200,
                    body: format!(r#"{{"AuthToken":"token-{}"}}"#, state.tokens_issued),
                })
            }
            None => Ok(HttpResponse {
                status: 200,
                body: "{}".to_string(),
            }),
        }
    }
}
