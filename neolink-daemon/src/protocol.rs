//! Control protocol on `~/.neolink/neolink.sock`.
//!
//! One JSON object per line each way. Requests are tagged by `cmd`
//! (`{"cmd":"scan"}`), so an unknown command is rejected while decoding.
//! Replies are `{"ok":true,"data":…}` or `{"ok":false,"error":"…"}`.

use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use neolink_core::paths::socket_path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};

/// Status requests retry this often while the socket is still coming up.
const STATUS_CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    /// Runtime state: start time, cycles, last summary, ledger sizes.
    Status,
    /// Run one cycle now and reply with its summary.
    Scan,
    /// Shut the daemon down.
    Stop,
}

impl DaemonRequest {
    pub fn name(self) -> &'static str {
        match self {
            DaemonRequest::Status => "status",
            DaemonRequest::Scan => "scan",
            DaemonRequest::Stop => "stop",
        }
    }

    /// The daemon closes the connection after answering.
    pub fn ends_session(self) -> bool {
        matches!(self, DaemonRequest::Stop)
    }

    fn connect_attempts(self) -> u32 {
        match self {
            DaemonRequest::Status => STATUS_CONNECT_ATTEMPTS,
            DaemonRequest::Scan | DaemonRequest::Stop => 1,
        }
    }
}

impl fmt::Display for DaemonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Data of a successful reply; a failed reply becomes `Protocol`.
    pub fn into_result(self) -> Result<Value, DaemonError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(DaemonError::Protocol(
            self.error
                .unwrap_or_else(|| "daemon reported an unspecified failure".to_string()),
        ))
    }
}

/// Ask the daemon under `home` to carry out `request` and return the reply
/// data. `Status` tolerates a daemon that is still binding its socket.
pub fn request(home: &Path, request: DaemonRequest) -> Result<Value, DaemonError> {
    let socket = socket_path(home);
    let mut attempt = 1;
    loop {
        match exchange(&socket, request) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < request.connect_attempts() => {
                attempt += 1;
                sleep(CONNECT_BACKOFF);
            }
            outcome => return outcome?.into_result(),
        }
    }
}

fn exchange(socket: &Path, request: DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let stream = match UnixStream::connect(socket) {
        Ok(stream) => stream,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) =>
        {
            return Err(DaemonError::DaemonNotRunning {
                socket: socket.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(socket, err)),
    };

    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    (&stream)
        .write_all(line.as_bytes())
        .map_err(|e| io_err(socket, e))?;

    let mut reply = String::new();
    BufReader::new(&stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(socket, e))?;
    if reply.trim().is_empty() {
        return Err(DaemonError::Protocol(format!(
            "daemon hung up without answering '{request}'"
        )));
    }
    Ok(serde_json::from_str(reply.trim_end())?)
}
