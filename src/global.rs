// Process-wide default logger
// Built lazily from environment variables on first use, exactly once.

use crate::config::LoggerConfig;
use crate::logger::Logger;
use once_cell::sync::OnceCell;

static DEFAULT_LOGGER: OnceCell<Logger> = OnceCell::new();

/// The process-wide logger, configured from `SERVICE_NAME`, `ENVIRONMENT`,
/// `LOG_LEVEL`, `LOG_FORMAT` and friends.
///
/// Every call returns the same instance. Concurrent first calls block until
/// the single build finishes.
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER.get_or_init(build_default_logger)
}

fn build_default_logger() -> Logger {
    let config = LoggerConfig::from_env();
    tracing::debug!(
        service_name = %config.service_name,
        environment = %config.environment_name,
        min_severity = %config.min_severity(),
        format = ?config.format(),
        "Building default logger"
    );
    Logger::new(&config)
}
