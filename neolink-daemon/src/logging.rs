use neolink_core::LogFormat;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber on stderr, keeping stdout for command
/// output. `RUST_LOG` overrides the default `info` filter. Later calls are
/// no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
