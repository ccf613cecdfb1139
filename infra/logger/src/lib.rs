//! # Logger
//!
//! Installs the global `tracing` subscriber for keel processes: console output, optional
//! rolling log files written by a non-blocking worker, and `RUST_LOG`-style filtering.
//!
//! The `log_level` and `log_format` strings of a shared configuration file map directly
//! onto the builder through [`LoggerBuilder::log_level`] and [`LoggerBuilder::log_format`].
//!
//! ```rust
//! use keel_logger::{LogFormat, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("keel-server")
//!     .log_level("debug")?
//!     .format(LogFormat::Standard)
//!     .init()?;
//! # Ok::<(), keel_logger::LoggerError>(())
//! ```

mod error;
mod level;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use crate::level::{LogFormat, parse_log_format, parse_log_level};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use private::Sealed;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    format: LogFormat,
    rotation: Rotation,
    max_files: usize,
    directives: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            format: LogFormat::Standard,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            directives: None,
        }
    }
}

#[derive(Debug)]
pub struct NoName;
#[derive(Debug)]
pub struct WithName(String);
#[derive(Debug)]
pub struct NoFile;
#[derive(Debug)]
pub struct WithFile;

mod private {
    pub trait Sealed {}
}
impl Sealed for NoName {}
impl Sealed for WithName {}
impl Sealed for NoFile {}
impl Sealed for WithFile {}

/// Configures and installs the global subscriber. A name is required before
/// [`LoggerBuilder::init`] becomes available; rotation settings only exist once a
/// log directory is set.
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = NoName, F: Sealed = NoFile> {
    config: LoggerConfig,
    name: N,
    file: PhantomData<F>,
}

impl<F: Sealed> LoggerBuilder<NoName, F> {
    /// Sets the process name, also used as the log file prefix.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<WithName, F> {
        LoggerBuilder { config: self.config, name: WithName(name.into()), file: PhantomData }
    }
}

impl LoggerBuilder<WithName, WithFile> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }
}

impl<F: Sealed> LoggerBuilder<WithName, F> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Sets the level from a configuration string such as `"warn"` or `"err"`.
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for unknown levels.
    pub fn log_level(self, level: &str) -> Result<Self, LoggerError> {
        Ok(self.level(parse_log_level(level)?))
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Sets the format from a configuration string (`"standard"` or `"json"`).
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for unknown formats.
    pub fn log_format(self, format: &str) -> Result<Self, LoggerError> {
        Ok(self.format(parse_log_format(format)?))
    }

    /// Adds filter directives such as `keel_listenerutil=debug,hyper=warn`.
    ///
    /// `RUST_LOG` is ignored when directives are set explicitly.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn directives(mut self, directives: impl Into<String>) -> Self {
        self.config.directives = Some(directives.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Writes rolling log files into `path`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn path(self, path: impl Into<PathBuf>) -> LoggerBuilder<WithName, WithFile> {
        let mut config = self.config;
        config.path = Some(path.into());
        LoggerBuilder { config, name: self.name, file: PhantomData }
    }

    /// Installs the subscriber.
    ///
    /// Keep the returned [`Logger`] alive for the lifetime of the process: dropping it
    /// stops the file writer.
    ///
    /// # Errors
    /// [`LoggerError::Subscriber`] when a global subscriber already exists,
    /// [`LoggerError::InvalidConfiguration`] for an empty name, zero `max_files`, bad
    /// directives or when no output is enabled.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let Self { config, name: WithName(name), .. } = self;
        validate(&config, &name)?;
        let filter = env_filter(&config)?;
        let json = config.format == LogFormat::Json;

        let mut layers = Vec::new();
        if config.console {
            let console = layer().with_target(true);
            layers.push(if json { console.json().boxed() } else { console.compact().with_ansi(true).boxed() });
        }

        let guard = match config.path {
            Some(path) => {
                std::fs::create_dir_all(&path).map_err(|e| LoggerError::Internal {
                    message: e.to_string().into(),
                    context: Some(format!("Failed to create log directory {}", path.display()).into()),
                })?;
                let appender = RollingFileAppender::builder()
                    .rotation(config.rotation)
                    .filename_prefix(&name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(config.max_files)
                    .build(&path)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file = layer().with_writer(writer).with_ansi(false);
                layers.push(if json { file.json().boxed() } else { file.boxed() });
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::invalid("no output enabled; enable the console or set a log directory"));
        }

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        tracing::debug!(logger = %name, level = %config.level, format = %config.format, "Logger initialized");
        Ok(Logger { name, guard })
    }
}

/// Handle to the installed subscriber; owns the file writer's worker guard.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub struct Logger {
    name: String,
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: NoName, file: PhantomData }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether log lines are also written to files.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!(logger = %self.name, "Flushing log files");
        }
    }
}

fn validate(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::invalid("logger name cannot be empty"));
    }
    if config.max_files == 0 {
        return Err(LoggerError::invalid("max_files must be greater than zero"));
    }
    Ok(())
}

fn env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.directives {
        Some(directives) => builder
            .parse(directives)
            .map_err(|e| LoggerError::invalid(format!("invalid filter directives {directives:?}: {e}"))),
        None => Ok(builder.from_env_lossy()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_builder_defaults() {
        let builder = Logger::builder().name("keel");
        assert!(builder.config.console);
        assert_eq!(builder.config.level, LevelFilter::INFO);
        assert_eq!(builder.config.format, LogFormat::Standard);
        assert!(builder.config.path.is_none());
    }

    #[test]
    fn test_builder_from_config_strings() -> Result<(), LoggerError> {
        let builder = Logger::builder()
            .name("keel")
            .log_level("err")?
            .log_format("json")?
            .path("/var/log/keel")
            .max_files(3);
        assert_eq!(builder.config.level, LevelFilter::ERROR);
        assert_eq!(builder.config.format, LogFormat::Json);
        assert_eq!(builder.config.max_files, 3);
        assert!(Logger::builder().name("keel").log_format("xml").is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_settings_rejected_before_install() {
        let err = Logger::builder().name("  ").init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = Logger::builder().name("keel").console(false).init().unwrap_err();
        assert!(err.to_string().contains("no output enabled"));

        let err = Logger::builder().name("keel").directives("keel=[[").init().unwrap_err();
        assert!(err.to_string().contains("invalid filter directives"));
    }

    #[test]
    #[serial]
    fn test_second_init_fails() {
        let first = Logger::builder().name("keel-first").init().unwrap();
        assert_eq!(first.name(), "keel-first");
        assert!(!first.writes_files());

        let second = Logger::builder().name("keel-second").init();
        assert!(matches!(second, Err(LoggerError::Subscriber { .. })));
    }
}
