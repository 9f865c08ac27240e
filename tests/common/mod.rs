// Shared helpers for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};
use structlog_facade::sink::WriterSink;
use structlog_facade::{Logger, LoggerConfig};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory writer shared between a sink and the test body.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Root logger writing to an in-memory buffer in the configured format.
pub fn capture(config: &LoggerConfig) -> (Logger, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let logger = Logger::with_sink(config, WriterSink::new(config.format(), buffer.clone()));
    (logger, buffer)
}

pub fn default_config() -> LoggerConfig {
    LoggerConfig {
        log_level: "DEBUG".to_string(),
        environment_name: "TEST".to_string(),
        service_name: "LOG_TEST".to_string(),
        default_fields: structlog_facade::fields! {
            "customField1" => 1,
            "customField2" => "2",
        },
        ..Default::default()
    }
}

/// Assert every field appears as `key=value` in a plain-format line.
pub fn assert_plain_entry(entry: &str, message: &str, fields: &structlog_facade::FieldSet) {
    assert!(entry.contains(message), "entry should contain message: {entry}");
    for (key, value) in fields.iter() {
        let rendered = structlog_facade::format::plain_value(value);
        assert!(
            entry.contains(&format!("{key}={rendered}")),
            "entry should contain field {key}: {entry}"
        );
    }
}
