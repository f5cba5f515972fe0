//! Registration, bearer-token management and payload delivery.

use std::collections::HashSet;

use neolink_core::{
    DeviceInformation, LogFile, MetricsReport, ResultReport, SerialNumber,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::payload::Payload;
use crate::routes;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

const UNAUTHORIZED: u16 = 401;

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    #[serde(rename = "AuthToken", alias = "authToken", alias = "auth_token")]
    auth_token: Option<String>,
}

/// Stateful client for the NeoSync service.
///
/// One bearer token is shared by every call; `registered` only remembers
/// which serials have already been announced so repeated sends for the same
/// device skip the registration round trip.
#[derive(Debug)]
pub struct SyncClient<T: Transport> {
    transport: T,
    token: Option<String>,
    registered: HashSet<SerialNumber>,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            token: None,
            registered: HashSet::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_registered(&self, serial: &SerialNumber) -> bool {
        self.registered.contains(serial)
    }

    pub fn send_results(&mut self, report: &ResultReport) -> Result<(), ClientError> {
        self.deliver(Payload::Results(report))
    }

    pub fn send_metrics(&mut self, report: &MetricsReport) -> Result<(), ClientError> {
        self.deliver(Payload::Metrics(report))
    }

    pub fn upload_log(&mut self, log: &LogFile) -> Result<(), ClientError> {
        self.deliver(Payload::Log(log))
    }

    /// Validate, serialize and POST one payload under the registration and
    /// single-retry protocol.
    pub fn deliver(&mut self, payload: Payload<'_>) -> Result<(), ClientError> {
        payload.validate()?;
        let body = payload.to_json()?;
        debug!(
            kind = payload.kind(),
            serial = %payload.serial_number(),
            bytes = body.len(),
            "delivering payload"
        );
        self.authenticated(
            payload.serial_number(),
            Method::Post,
            payload.route(),
            Some(&body),
        )?;
        Ok(())
    }

    /// Unauthenticated reachability probe.
    pub fn ping(&self) -> Result<(), ClientError> {
        let response = self.transport.execute(&HttpRequest {
            method: Method::Get,
            route: routes::PING,
            body: None,
            bearer: None,
        })?;
        ensure_success(routes::PING, response).map(|_| ())
    }

    /// Ask the service whether newer firmware exists for the device.
    /// Returns the response document as-is; an empty body is `Null`.
    pub fn check_for_firmware_update(
        &mut self,
        serial: &SerialNumber,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self.authenticated(
            serial,
            Method::Get,
            routes::FIRMWARE_CHECK_FOR_UPDATE,
            None,
        )?;
        if response.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    fn authenticated(
        &mut self,
        serial: &SerialNumber,
        method: Method,
        route: &'static str,
        body: Option<&str>,
    ) -> Result<HttpResponse, ClientError> {
        self.ensure_registered(serial)?;
        let response = self.call(method, route, body)?;
        if response.status != UNAUTHORIZED {
            return ensure_success(route, response);
        }

        warn!(route, serial = %serial, "token rejected, re-registering");
        self.token = None;
        self.ensure_registered(serial)?;
        let retry = self.call(method, route, body)?;
        if retry.status == UNAUTHORIZED {
            self.token = None;
            return Err(ClientError::Unauthorized { route });
        }
        ensure_success(route, retry)
    }

    fn call(
        &self,
        method: Method,
        route: &'static str,
        body: Option<&str>,
    ) -> Result<HttpResponse, ClientError> {
        self.transport.execute(&HttpRequest {
            method,
            route,
            body,
            bearer: self.token.as_deref(),
        })
    }

    /// A serial the client has not announced yet always triggers a fresh
    /// registration, which also replaces the shared token.
    fn ensure_registered(&mut self, serial: &SerialNumber) -> Result<(), ClientError> {
        if !self.registered.contains(serial) {
            self.token = None;
        }
        if self.token.is_some() {
            return Ok(());
        }
        let token = self.register(serial)?;
        self.token = Some(token);
        self.registered.insert(serial.clone());
        Ok(())
    }

    fn register(&self, serial: &SerialNumber) -> Result<String, ClientError> {
        let failed = |reason: String| ClientError::Registration {
            serial: serial.to_string(),
            reason,
        };

        let body = serde_json::to_string(&DeviceInformation::placeholder(serial.clone()))?;
        let response = self
            .transport
            .execute(&HttpRequest {
                method: Method::Post,
                route: routes::REGISTER,
                body: Some(&body),
                bearer: None,
            })
            .map_err(|err| failed(err.to_string()))?;
        if !response.is_success() {
            return Err(failed(format!(
                "HTTP {}: {}",
                response.status,
                response.body.trim()
            )));
        }

        let parsed: RegistrationResponse = serde_json::from_str(&response.body)
            .map_err(|err| failed(format!("unreadable response: {err}")))?;
        match parsed.auth_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                info!(serial = %serial, "device registered");
                Ok(token)
            }
            None => Err(failed("response carried no AuthToken".to_string())),
        }
    }
}

fn ensure_success(route: &'static str, response: HttpResponse) -> Result<HttpResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            route,
            status: response.status,
            body: response.body,
        })
    }
}
