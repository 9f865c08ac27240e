// Output encodings for emitted records
// Format policy resolution plus the plain (logfmt-style) and JSON encoders.

use crate::sink::Record;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;

const JSON: &str = "JSON";
const PRODUCTION: &str = "production";
const DEFAULT_FORMAT: &str = "plain";
const DEFAULT_ENVIRONMENT: &str = "development";

/// Keys written by the encoders themselves. A user field with one of these
/// names is written as `fields.<name>` instead.
const RESERVED_KEYS: [&str; 3] = ["time", "level", "msg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Which configuration value decides the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum FormatSource {
    /// `log_format`: "json" in any case selects JSON.
    #[default]
    Format,
    /// `environment_name`: exactly "production" selects JSON.
    Environment,
}

fn value_or_default<'a>(text: &'a str, default: &'a str) -> &'a str {
    let v = text.trim();
    if v.is_empty() { default } else { v }
}

/// Resolve a textual format. Blank means plain; "json" in any case means JSON.
pub fn resolve_format(text: &str) -> LogFormat {
    if value_or_default(text, DEFAULT_FORMAT).to_uppercase() == JSON {
        LogFormat::Json
    } else {
        LogFormat::Plain
    }
}

/// Environment-driven variant: only the exact name "production" selects JSON.
pub fn resolve_format_for_environment(environment: &str) -> LogFormat {
    if value_or_default(environment, DEFAULT_ENVIRONMENT) == PRODUCTION {
        LogFormat::Json
    } else {
        LogFormat::Plain
    }
}

impl LogFormat {
    /// Encode one record as a single line, newline included.
    pub fn encode(self, record: &Record<'_>, buf: &mut Vec<u8>) {
        match self {
            LogFormat::Plain => encode_plain(record, buf),
            LogFormat::Json => encode_json(record, buf),
        }
    }
}

fn field_key(key: &str) -> String {
    if RESERVED_KEYS.contains(&key) {
        format!("fields.{key}")
    } else {
        key.to_string()
    }
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+'))
}

fn write_plain_value(out: &mut String, text: &str) {
    if needs_quoting(text) {
        let _ = write!(out, "{text:?}");
    } else {
        out.push_str(text);
    }
}

/// Text form of a field value in plain output. Strings are written bare,
/// everything else as compact JSON.
pub fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_plain(record: &Record<'_>, buf: &mut Vec<u8>) {
    let mut line = String::with_capacity(64 + record.message.len() + record.fields.len() * 16);

    line.push_str("time=");
    write_plain_value(&mut line, &record.time.to_rfc3339_opts(SecondsFormat::Secs, true));
    line.push_str(" level=");
    line.push_str(record.severity.as_str());
    line.push_str(" msg=");
    write_plain_value(&mut line, record.message);

    for (key, value) in record.fields.sorted() {
        line.push(' ');
        line.push_str(&field_key(key));
        line.push('=');
        write_plain_value(&mut line, &plain_value(value));
    }
    line.push('\n');

    buf.extend_from_slice(line.as_bytes());
}

/// The JSON object for a record: one key per field plus `time`, `level`, `msg`.
pub(crate) fn json_object(record: &Record<'_>) -> Map<String, Value> {
    let mut object = Map::new();
    for (key, value) in record.fields.iter() {
        object.insert(field_key(key), value.clone());
    }
    object.insert(
        "time".to_string(),
        Value::String(record.time.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    object.insert("level".to_string(), Value::String(record.severity.to_string()));
    object.insert("msg".to_string(), Value::String(record.message.to_string()));
    object
}

pub(crate) fn write_json_line(object: Map<String, Value>, buf: &mut Vec<u8>) {
    // Serializing a map of owned JSON values cannot fail.
    if serde_json::to_writer(&mut *buf, &Value::Object(object)).is_ok() {
        buf.push(b'\n');
    }
}

fn encode_json(record: &Record<'_>, buf: &mut Vec<u8>) {
    write_json_line(json_object(record), buf);
}
