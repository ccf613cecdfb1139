use crate::error::LoggerError;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::level_filters::LevelFilter;

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Standard,
    Json,
}

/// Maps a configured `log_level` string onto a filter.
///
/// Accepts `trace`, `debug`, `info`, `warn`, `err` and `error`, case-insensitively.
/// `off` silences everything.
pub fn parse_log_level(value: &str) -> Result<LevelFilter, LoggerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" | "" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "err" | "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        other => Err(LoggerError::InvalidConfiguration {
            message: format!("unknown log level {other:?}").into(),
            context: Some("log_level".into()),
        }),
    }
}

/// Maps a configured `log_format` string (`standard` or `json`).
pub fn parse_log_format(value: &str) -> Result<LogFormat, LoggerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(LogFormat::Standard);
    }
    LogFormat::from_str(trimmed).map_err(|_| LoggerError::InvalidConfiguration {
        message: format!("unknown log format {trimmed:?}, expected \"standard\" or \"json\"").into(),
        context: Some("log_format".into()),
    })
}
