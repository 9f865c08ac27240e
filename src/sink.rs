// Sinks: where filtered records end up
// A sink owns encoding and destination; the logger only decides what reaches it.

use crate::error::SinkError;
use crate::fields::FieldSet;
use crate::format::LogFormat;
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;

/// One log record as handed to a sink.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub severity: Severity,
    pub fields: &'a FieldSet,
    pub message: &'a str,
    pub time: DateTime<Utc>,
}

/// External capability that receives records which passed the level filter.
pub trait Sink: Send + Sync {
    fn write(&self, record: &Record<'_>);

    /// Called before the process terminates on a fatal record.
    fn flush(&self) {}
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, record: &Record<'_>) {
        (**self).write(record)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, record: &Record<'_>) {
        (**self).write(record)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

/// Where a [`WriterSink`] built from configuration writes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    #[default]
    Stdout,
    Stderr,
    /// Hand records to the installed `tracing` subscriber.
    Tracing,
    File(PathBuf),
}

impl Destination {
    /// "stdout" (or blank), "stderr", "tracing", anything else is a file path.
    pub fn parse(text: &str) -> Self {
        let v = text.trim();
        match v.to_lowercase().as_str() {
            "" | "stdout" => Destination::Stdout,
            "stderr" => Destination::Stderr,
            "tracing" => Destination::Tracing,
            _ => Destination::File(PathBuf::from(v)),
        }
    }
}

impl From<String> for Destination {
    fn from(text: String) -> Self {
        Destination::parse(&text)
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        match destination {
            Destination::Stdout => "stdout".to_string(),
            Destination::Stderr => "stderr".to_string(),
            Destination::Tracing => "tracing".to_string(),
            Destination::File(path) => path.display().to_string(),
        }
    }
}

/// Encodes records and writes them through any `MakeWriter`.
pub struct WriterSink<W> {
    format: LogFormat,
    make_writer: W,
}

impl<W> WriterSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    pub fn new(format: LogFormat, make_writer: W) -> Self {
        WriterSink {
            format,
            make_writer,
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl<W> Sink for WriterSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn write(&self, record: &Record<'_>) {
        let mut buf = Vec::with_capacity(128);
        self.format.encode(record, &mut buf);
        // One write call per record keeps lines whole across threads.
        let _ = self.make_writer.make_writer().write_all(&buf);
    }

    fn flush(&self) {
        let _ = self.make_writer.make_writer().flush();
    }
}

/// Build the console or file sink for a destination.
pub fn destination_sink(
    destination: &Destination,
    format: LogFormat,
) -> Result<Box<dyn Sink>, SinkError> {
    match destination {
        Destination::Stdout => Ok(Box::new(WriterSink::new(format, std::io::stdout))),
        Destination::Stderr => Ok(Box::new(WriterSink::new(format, std::io::stderr))),
        Destination::Tracing => Ok(Box::new(TracingSink)),
        Destination::File(path) => {
            let directory = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "structlog.log".to_string());

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(directory)
                .map_err(|source| SinkError::Destination {
                    path: path.clone(),
                    source,
                })?;

            Ok(Box::new(WriterSink::new(format, appender)))
        }
    }
}

/// Forwards records to whatever `tracing` subscriber is installed.
///
/// Facade fields are carried as one JSON-encoded `fields` value because
/// `tracing` needs field names at compile time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn write(&self, record: &Record<'_>) {
        let fields: Map<String, Value> = record
            .fields
            .sorted()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let fields = Value::Object(fields);
        let severity = record.severity;
        let message = record.message;

        match severity.tracing_level() {
            tracing::Level::DEBUG => {
                tracing::debug!(target: "structlog", %severity, %fields, "{message}")
            }
            tracing::Level::INFO => {
                tracing::info!(target: "structlog", %severity, %fields, "{message}")
            }
            tracing::Level::WARN => {
                tracing::warn!(target: "structlog", %severity, %fields, "{message}")
            }
            _ => tracing::error!(target: "structlog", %severity, %fields, "{message}"),
        }
    }
}

/// Sends every record to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for FanoutSink {
    fn write(&self, record: &Record<'_>) {
        for sink in &self.sinks {
            sink.write(record);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl Sink for Collect {
        fn write(&self, record: &Record<'_>) {
            self.0.lock().unwrap().push(record.message.to_string());
        }
    }

    fn record<'a>(fields: &'a FieldSet, message: &'a str) -> Record<'a> {
        Record {
            severity: Severity::Warn,
            fields,
            message,
            time: Utc::now(),
        }
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse(""), Destination::Stdout);
        assert_eq!(Destination::parse("STDOUT"), Destination::Stdout);
        assert_eq!(Destination::parse("stderr"), Destination::Stderr);
        assert_eq!(Destination::parse("Tracing"), Destination::Tracing);
        assert_eq!(
            Destination::parse("/var/log/app.log"),
            Destination::File(PathBuf::from("/var/log/app.log"))
        );
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(Collect::default());
        let second = Arc::new(Collect::default());
        let fanout = FanoutSink::new().with(first.clone()).with(second.clone());
        let fields = FieldSet::new();

        fanout.write(&record(&fields, "hello"));

        assert_eq!(fanout.len(), 2);
        assert_eq!(*first.0.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*second.0.lock().unwrap(), vec!["hello".to_string()]);
    }

    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for VecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_forwards_fields() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let buf = buf.clone();
            move || VecWriter(buf.clone())
        };
        let subscriber = tracing_subscriber::fmt()
            .with_writer(make)
            .with_ansi(false)
            .finish();
        let fields = crate::fields! { "k" => "v" };

        tracing::subscriber::with_default(subscriber, || {
            TracingSink.write(&record(&fields, "bridged"));
        });

        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("bridged"), "{out}");
        assert!(out.contains(r#"fields={"k":"v"}"#), "{out}");
    }

    #[test]
    fn test_file_destination_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = destination_sink(&Destination::File(path.clone()), LogFormat::Plain).unwrap();
        let fields = crate::fields! { "k" => "v" };

        sink.write(&record(&fields, "to file"));
        sink.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("msg=\"to file\""), "{content}");
        assert!(content.contains("k=v"), "{content}");
    }
}
