//! Diagnostic logging setup.
//!
//! The engine only emits `tracing` events; the binary decides where they go.
//! Logs are written to stderr so stdout stays clean for the report and JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a `-v` count, or `quiet`.
pub fn level_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a stderr subscriber. `RUST_LOG`, when set and valid, wins over
/// the level derived from the flags.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    verbosity: u8,
    quiet: bool,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(verbosity, quiet)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()
}
