//! Logging setup for processes embedding the broker.

mod error;
mod format;
mod logger;

pub use error::LoggerError;
pub use format::LoggerFormat;
pub use logger::LoggerConfig;

use crate::config::LoggingConfig;

pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => logger::text(cfg),
        LoggerFormat::Json => logger::json(cfg),
    }
}

impl TryFrom<&LoggingConfig> for LoggerConfig {
    type Error = LoggerError;

    fn try_from(cfg: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(LoggerConfig {
            format: cfg.format.parse()?,
            level: cfg.level.clone(),
            ..LoggerConfig::default()
        })
    }
}
