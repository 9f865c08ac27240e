// Library exports for structlog-facade
// Structured logging facade: composable field sets, contextual loggers and
// pluggable sinks.

pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod format;
pub mod global;
pub mod logger;
pub mod severity;
pub mod shipper;
pub mod sink;
pub mod telemetry;

pub use config::LoggerConfig;
pub use context::{RequestContext, TraceContext};
pub use fields::{FieldSet, merge};
pub use format::{LogFormat, resolve_format, resolve_format_for_environment};
pub use global::default_logger;
pub use logger::{Logger, LoggerKind, Policy};
pub use severity::{Severity, resolve_level};
pub use sink::{Record, Sink};

#[doc(hidden)]
pub use serde_json as __json;
