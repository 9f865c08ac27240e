// Tracing subscriber setup
// Used for the crate's own diagnostics and as the backend of `TracingSink`.

use crate::config::LoggerConfig;
use crate::format::LogFormat;
use crate::severity::Severity;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn filter_directive(severity: Severity) -> &'static str {
    match severity {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warn => "warn",
        Severity::Error | Severity::Fatal | Severity::Panic => "error",
    }
}

/// Install a global `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG` if set and by the configured level otherwise.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggerConfig) -> Result<()> {
    let level = filter_directive(config.min_severity());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.format() {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .try_init()
                .map_err(anyhow::Error::msg)?;
        }
        LogFormat::Plain => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(anyhow::Error::msg)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_levels_filter_at_error() {
        assert_eq!(filter_directive(Severity::Fatal), "error");
        assert_eq!(filter_directive(Severity::Panic), "error");
        assert_eq!(filter_directive(Severity::Debug), "debug");
    }
}
