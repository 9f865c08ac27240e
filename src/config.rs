// Configuration for the root logger
// Textual values are kept as given and resolved at construction; nothing here
// fails on a malformed level or format.

use crate::error::ConfigError;
use crate::fields::FieldSet;
use crate::format::{FormatSource, LogFormat, resolve_format, resolve_format_for_environment};
use crate::severity::{Severity, resolve_level};
use crate::shipper::{DEFAULT_SHIPPER_PORT, ShipperConfig};
use crate::sink::Destination;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_LOG_DESTINATION: &str = "LOG_DESTINATION";
pub const ENV_LOG_SHIPPER_HOST: &str = "LOG_SHIPPER_HOST";
pub const ENV_LOG_SHIPPER_PORT: &str = "LOG_SHIPPER_PORT";

pub const SERVICE_NAME_FIELD: &str = "service_name";
pub const ENVIRONMENT_FIELD: &str = "environment";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub service_name: String,

    pub environment_name: String,

    /// Minimum severity name, any case. Unknown or blank means "info".
    pub log_level: String,

    /// "json" (any case) or anything else for plain text.
    pub log_format: String,

    pub format_source: FormatSource,

    pub default_fields: FieldSet,

    pub destination: Destination,

    /// Drop records whose message is empty or whitespace.
    pub suppress_blank_messages: bool,

    pub shipper: Option<ShipperConfig>,
}

// CLI arguments for the `structlog` binary
#[derive(Debug, Parser)]
#[command(name = "structlog")]
#[command(about = "Emit one structured log record", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Service name attached as `service_name`
    #[arg(long)]
    pub service_name: Option<String>,

    /// Environment name attached as `environment`
    #[arg(long)]
    pub environment: Option<String>,

    /// Minimum log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format ("plain" or "json")
    #[arg(long)]
    pub log_format: Option<String>,

    /// Which setting selects the encoding
    #[arg(long, value_enum)]
    pub format_source: Option<FormatSource>,

    /// stdout, stderr, tracing or a file path
    #[arg(long)]
    pub destination: Option<String>,

    /// Extra field as key=value (repeatable). Values that parse as JSON are kept typed.
    #[arg(short, long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,

    /// Correlation id attached as `traceId`
    #[arg(long)]
    pub trace_id: Option<String>,

    /// Severity of the emitted record
    #[arg(short, long, value_enum, default_value_t = Severity::Info)]
    pub severity: Severity,

    /// Message to log
    pub message: String,
}

fn parse_field(text: &str) -> Result<(String, Value), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {text:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in {text:?}"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl LoggerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        LoggerConfig {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn min_severity(&self) -> Severity {
        resolve_level(&self.log_level)
    }

    pub fn format(&self) -> LogFormat {
        match self.format_source {
            FormatSource::Format => resolve_format(&self.log_format),
            FormatSource::Environment => resolve_format_for_environment(&self.environment_name),
        }
    }

    /// Default fields plus `service_name` and `environment` when those are not blank.
    pub fn base_fields(&self) -> FieldSet {
        let mut fields = self.default_fields.clone();
        if !self.service_name.trim().is_empty() {
            fields = fields.with(SERVICE_NAME_FIELD, self.service_name.clone());
        }
        if !self.environment_name.trim().is_empty() {
            fields = fields.with(ENVIRONMENT_FIELD, self.environment_name.clone());
        }
        fields
    }

    /// Read the recognized environment variables. Missing ones stay at their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).unwrap_or_default();

        let shipper_host = var(ENV_LOG_SHIPPER_HOST);
        let shipper = if shipper_host.trim().is_empty() {
            None
        } else {
            let port = lookup(ENV_LOG_SHIPPER_PORT)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SHIPPER_PORT.to_string());
            Some(ShipperConfig::new(shipper_host, port))
        };

        LoggerConfig {
            service_name: var(ENV_SERVICE_NAME),
            environment_name: var(ENV_ENVIRONMENT),
            log_level: var(ENV_LOG_LEVEL),
            log_format: var(ENV_LOG_FORMAT),
            destination: Destination::parse(&var(ENV_LOG_DESTINATION)),
            shipper,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Precedence: CLI > file > env > defaults.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::from_env(),
        };
        Ok(config.apply_cli_overrides(cli))
    }

    fn apply_cli_overrides(mut self, cli: &CliArgs) -> Self {
        if let Some(name) = &cli.service_name {
            self.service_name = name.clone();
        }

        if let Some(environment) = &cli.environment {
            self.environment_name = environment.clone();
        }

        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }

        if let Some(format) = &cli.log_format {
            self.log_format = format.clone();
        }

        if let Some(source) = cli.format_source {
            self.format_source = source;
        }

        if let Some(destination) = &cli.destination {
            self.destination = Destination::parse(destination);
        }

        self
    }
}
