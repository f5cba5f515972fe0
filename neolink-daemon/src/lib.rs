//! Background agent: periodic scan loop, directory watcher and control socket.

mod agent;
mod error;
pub mod logging;
pub mod protocol;
mod runtime;

pub use agent::Agent;
pub use error::DaemonError;
pub use logging::init_tracing;
pub use protocol::{request, DaemonRequest, DaemonResponse};
pub use runtime::{run, serve, start_blocking};
