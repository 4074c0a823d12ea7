//! Global tracing initialization for the hy2ctl binaries.
//!
//! Library code logs through [`crate::LogSink`]; this only installs the
//! process-wide subscriber a binary uses for its own output.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber. Both formats write to stderr
/// so log lines never mix with command output on stdout.
///
/// * `default_filter` -- filter used when `RUST_LOG` is unset or does not
///   parse (e.g. `"hy2ctl=info"`).
/// * `log_json` -- emit structured JSON lines instead of the human-readable
///   format.
pub fn init_tracing(default_filter: &str, log_json: bool) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_subscriber_installs_once() {
        assert!(init_tracing("hy2ctl=info", true).is_ok());
        tracing::info!(target: "hy2ctl", "goes to stderr");
        assert!(init_tracing("hy2ctl=info", false).is_err());
    }
}
