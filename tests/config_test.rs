// Unit tests for configuration loading and policy resolution

use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use structlog_facade::config::{ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_SERVICE_NAME};
use structlog_facade::error::ConfigError;
use structlog_facade::format::FormatSource;
use structlog_facade::shipper::ShipperConfig;
use structlog_facade::sink::Destination;
use structlog_facade::{LogFormat, LoggerConfig, Severity};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn test_config_default_values() {
    let config = LoggerConfig::default();

    assert_eq!(config.min_severity(), Severity::Info);
    assert_eq!(config.format(), LogFormat::Plain);
    assert_eq!(config.format_source, FormatSource::Format);
    assert_eq!(config.destination, Destination::Stdout);
    assert!(config.shipper.is_none());
    assert!(!config.suppress_blank_messages);
    assert!(config.base_fields().is_empty());
}

#[test]
fn test_config_from_env_values() {
    let config = LoggerConfig::from_lookup(lookup(&[
        (ENV_SERVICE_NAME, "katalog-service"),
        ("ENVIRONMENT", "staging"),
        (ENV_LOG_LEVEL, "WARN"),
        (ENV_LOG_FORMAT, "json"),
        ("LOG_DESTINATION", "stderr"),
    ]));

    assert_eq!(config.service_name, "katalog-service");
    assert_eq!(config.environment_name, "staging");
    assert_eq!(config.min_severity(), Severity::Warn);
    assert_eq!(config.format(), LogFormat::Json);
    assert_eq!(config.destination, Destination::Stderr);
}

#[test]
fn test_config_from_env_malformed_values_fall_back() {
    let config = LoggerConfig::from_lookup(lookup(&[
        (ENV_LOG_LEVEL, "loudest"),
        (ENV_LOG_FORMAT, "yaml"),
    ]));

    assert_eq!(config.min_severity(), Severity::Info);
    assert_eq!(config.format(), LogFormat::Plain);
}

#[test]
fn test_config_from_env_shipper_default_port() {
    let config = LoggerConfig::from_lookup(lookup(&[("LOG_SHIPPER_HOST", "logstash")]));
    assert_eq!(config.shipper, Some(ShipperConfig::new("logstash", "5000")));

    let config = LoggerConfig::from_lookup(lookup(&[
        ("LOG_SHIPPER_HOST", "logstash"),
        ("LOG_SHIPPER_PORT", "6000"),
    ]));
    assert_eq!(config.shipper.unwrap().address(), "logstash:6000");

    let config = LoggerConfig::from_lookup(lookup(&[("LOG_SHIPPER_HOST", "  ")]));
    assert!(config.shipper.is_none());
}

#[test]
fn test_base_fields_include_service_name() {
    let fields = LoggerConfig::new("orders").base_fields();

    assert_eq!(fields.len(), 1);
    assert_eq!(fields.get("service_name"), Some(&json!("orders")));
}

#[test]
fn test_base_fields_skip_blank_names() {
    let config = LoggerConfig {
        service_name: "  ".to_string(),
        environment_name: "prod".to_string(),
        default_fields: structlog_facade::fields! { "region" => "eu" },
        ..Default::default()
    };

    let fields = config.base_fields();

    assert_eq!(fields.len(), 2);
    assert!(!fields.contains_key("service_name"));
    assert_eq!(fields.get("environment"), Some(&json!("prod")));
    assert_eq!(fields.get("region"), Some(&json!("eu")));
    // Building the base set leaves the configured defaults alone.
    assert_eq!(config.default_fields.len(), 1);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
service_name = "orders"
environment_name = "production"
log_level = "debug"
format_source = "environment"
destination = "stderr"
suppress_blank_messages = true

[default_fields]
team = "payments"
shard = 3

[shipper]
host = "logstash.internal"
"#
    )
    .unwrap();

    let config = LoggerConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.service_name, "orders");
    assert_eq!(config.min_severity(), Severity::Debug);
    assert_eq!(config.format(), LogFormat::Json);
    assert_eq!(config.destination, Destination::Stderr);
    assert!(config.suppress_blank_messages);
    assert_eq!(config.default_fields.get("shard"), Some(&json!(3)));
    assert_eq!(config.shipper.unwrap().address(), "logstash.internal:5000");
}

#[test]
fn test_load_from_file_missing() {
    let result = LoggerConfig::load_from_file(std::path::Path::new("/nonexistent/structlog.toml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_load_from_file_invalid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "service_name = [unterminated").unwrap();

    let result = LoggerConfig::load_from_file(file.path());

    assert!(matches!(result, Err(ConfigError::Parse { .. })));
    assert!(result.unwrap_err().to_string().contains("failed to parse config file"));
}
