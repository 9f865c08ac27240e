// Root and contextual loggers
// Loggers are immutable handles: enrichment always returns a new logger and
// the backend (sink + policy) is shared between a root and everything derived
// from it.

use crate::config::LoggerConfig;
use crate::context::{RequestContext, TRACE_ID_FIELD, TraceContext, extract_trace_id};
use crate::fields::{FieldSet, merge};
use crate::format::LogFormat;
use crate::severity::Severity;
use crate::shipper::ShipperSink;
use crate::sink::{FanoutSink, Record, Sink, WriterSink, destination_sink};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Level filter and output settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub min_severity: Severity,
    pub format: LogFormat,
    pub suppress_blank_messages: bool,
}

impl Policy {
    pub fn from_config(config: &LoggerConfig) -> Self {
        Policy {
            min_severity: config.min_severity(),
            format: config.format(),
            suppress_blank_messages: config.suppress_blank_messages,
        }
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

struct Backend {
    sink: Box<dyn Sink>,
    policy: Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerKind {
    /// Built directly from configuration; carries the base fields.
    Root,
    /// Derived through `with_fields` or `from_context`.
    Contextual,
}

/// A field-bearing logging handle.
///
/// Both root and contextual loggers share this type and the same operations;
/// [`Logger::kind`] tells them apart. Handles are cheap to clone and safe to
/// share between threads.
#[derive(Clone)]
pub struct Logger {
    backend: Arc<Backend>,
    fields: FieldSet,
    kind: LoggerKind,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("policy", &self.backend.policy)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Build a root logger and its sinks from configuration.
    ///
    /// The destination sink falls back to stdout if it cannot be opened. A
    /// shipper that cannot connect is left out and logging carries on
    /// without it.
    pub fn new(config: &LoggerConfig) -> Self {
        let format = config.format();
        let mut sinks = FanoutSink::new();

        match destination_sink(&config.destination, format) {
            Ok(sink) => sinks.push(sink),
            Err(e) => {
                tracing::warn!(error = %e, "Log destination unavailable, writing to stdout");
                sinks.push(Box::new(WriterSink::new(format, std::io::stdout)));
            }
        }

        if let Some(shipper) = config.shipper.as_ref().filter(|s| !s.host.trim().is_empty()) {
            match ShipperSink::connect(shipper, &config.service_name) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => {
                    tracing::warn!(
                        address = %shipper.address(),
                        error = %e,
                        "Log shipper unavailable, continuing without it"
                    );
                }
            }
        }

        Self::with_sink(config, sinks)
    }

    /// Build a root logger writing to `sink`. `destination` and `shipper`
    /// in the config are ignored.
    pub fn with_sink(config: &LoggerConfig, sink: impl Sink + 'static) -> Self {
        Logger {
            backend: Arc::new(Backend {
                sink: Box::new(sink),
                policy: Policy::from_config(config),
            }),
            fields: config.base_fields(),
            kind: LoggerKind::Root,
        }
    }

    pub fn kind(&self) -> LoggerKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        self.kind == LoggerKind::Root
    }

    /// Fields every record from this logger carries.
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn policy(&self) -> Policy {
        self.backend.policy
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.backend.policy.enabled(severity)
    }

    /// Derive a contextual logger; `addition` overrides existing keys.
    pub fn with_fields(&self, addition: &FieldSet) -> Logger {
        Logger {
            backend: Arc::clone(&self.backend),
            fields: merge(&self.fields, addition),
            kind: LoggerKind::Contextual,
        }
    }

    /// Shorthand for a single extra field.
    pub fn with_field(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Logger {
        self.with_fields(&FieldSet::new().with(key, value))
    }

    /// Attach the context's correlation id as `traceId`. Without one the
    /// result logs exactly like `self`.
    pub fn from_context<C: TraceContext + ?Sized>(&self, ctx: &C) -> Logger {
        match extract_trace_id(ctx) {
            Some(id) => self.with_field(TRACE_ID_FIELD, id),
            None => self.with_fields(&FieldSet::new()),
        }
    }

    /// [`Logger::from_context`] using the ambient [`RequestContext`].
    pub fn from_current(&self) -> Logger {
        self.from_context(&RequestContext::current())
    }

    /// Emit `message` at `severity`.
    ///
    /// Records below the configured minimum never reach the sink. `Fatal`
    /// exits the process and `Panic` unwinds, whether or not the record
    /// itself was enabled.
    pub fn log(&self, severity: Severity, message: impl fmt::Display) {
        match severity {
            Severity::Fatal => self.fatal(message),
            Severity::Panic => self.panic(message),
            _ => {
                if self.enabled(severity) {
                    self.write(severity, &message.to_string());
                }
            }
        }
    }

    /// Logged at `Info`.
    pub fn print(&self, message: impl fmt::Display) {
        self.log(Severity::Info, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Severity::Info, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Severity::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Severity::Error, message);
    }

    /// Flush every sink; for the shipper this waits briefly for queued records.
    pub fn flush(&self) {
        self.backend.sink.flush();
    }

    /// Write the record, flush the sinks and exit with status 1.
    pub fn fatal(&self, message: impl fmt::Display) -> ! {
        let message = message.to_string();
        if self.enabled(Severity::Fatal) {
            self.write(Severity::Fatal, &message);
        }
        self.backend.sink.flush();
        std::process::exit(1)
    }

    /// Write the record, then panic with the message as payload.
    pub fn panic(&self, message: impl fmt::Display) -> ! {
        let message = message.to_string();
        self.write(Severity::Panic, &message);
        self.backend.sink.flush();
        panic!("{message}")
    }

    fn write(&self, severity: Severity, message: &str) {
        if self.backend.policy.suppress_blank_messages && message.trim().is_empty() {
            return;
        }

        let fields = merge(&self.fields, &FieldSet::new());
        let record = Record {
            severity,
            fields: &fields,
            message,
            time: Utc::now(),
        };
        self.backend.sink.write(&record);
    }
}

/// Formatted emit: `emitf!(logger, Severity::Info, "user {} logged in", id)`.
#[macro_export]
macro_rules! emitf {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {
        $logger.log($severity, ::std::format_args!($($arg)+))
    };
}
