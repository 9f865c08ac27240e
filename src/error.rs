// Error types for the logging facade
// Emit paths never surface these; they only come out of construction and config loading.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading a [`crate::config::LoggerConfig`] from a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure while building a sink. Callers treat these as "omit the sink".
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to connect to log shipper at {address}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start shipper runtime")]
    Runtime(#[source] std::io::Error),

    #[error("failed to open log destination {path:?}")]
    Destination {
        path: PathBuf,
        #[source]
        source: tracing_appender::rolling::InitError,
    },
}

/// Returned by `Severity::from_str` for names outside the enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a valid severity: {0:?}")]
pub struct ParseSeverityError(pub String);
