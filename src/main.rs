// structlog: emit a single record through the facade
// Wires together config, diagnostics and a root logger.

use anyhow::{Context, Result};
use clap::Parser;
use structlog_facade::config::CliArgs;
use structlog_facade::{FieldSet, Logger, LoggerConfig, RequestContext, telemetry};

fn main() -> Result<()> {
    let cli = CliArgs::parse();

    let config = LoggerConfig::load(&cli).context("Failed to load configuration")?;

    telemetry::init(&config).context("Failed to initialize diagnostics")?;

    tracing::debug!(
        service_name = %config.service_name,
        min_severity = %config.min_severity(),
        format = ?config.format(),
        destination = ?config.destination,
        "structlog starting"
    );

    let logger = Logger::new(&config);
    let extra: FieldSet = cli.fields.iter().cloned().collect();
    let ctx = cli.trace_id.clone().map(RequestContext::with_trace_id);

    logger
        .with_fields(&extra)
        .from_context(&ctx)
        .log(cli.severity, &cli.message);
    logger.flush();

    Ok(())
}
