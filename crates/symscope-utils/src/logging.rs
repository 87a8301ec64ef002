//! # Logging Utilities
//!
//! Logging bootstrap for symscope binaries and tests, built on `tracing`.
//!
//! The library crates only emit events through the `tracing` macros; nothing
//! is printed unless a binary installs a subscriber with one of the functions
//! below. Console output goes to stderr so that command output on stdout
//! stays machine-readable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symscope_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=symscope_core=trace`)
//! - `SYMSCOPE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `SYMSCOPE_LOG_FILE`: Optional path to a log file, rotated daily
//!
//! ## Examples
//!
//! ```rust,no_run
//! use symscope_utils::{LogFormat, LogLevel, init_logging_with_level};
//!
//! init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
//!     .expect("Failed to initialize logging");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_VAR: &str = "SYMSCOPE_LOG_FORMAT";

/// Environment variable naming an additional log file
pub const LOG_FILE_VAR: &str = "SYMSCOPE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Resolved logging setup
///
/// Built from the environment by [`LoggingConfig::from_env`], then adjusted
/// by command-line flags before [`LoggingConfig::init`] installs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig
{
    /// Output format for console and file
    pub format: LogFormat,
    /// Level used when `RUST_LOG` is unset; an explicit level overrides it
    pub level: Option<LogLevel>,
    /// Extra file sink
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig
{
    fn default() -> Self
    {
        Self {
            format: LogFormat::Pretty,
            level: None,
            file: None,
        }
    }
}

impl LoggingConfig
{
    /// Read `SYMSCOPE_LOG_FORMAT` and `SYMSCOPE_LOG_FILE`
    ///
    /// An unknown format falls back to pretty output.
    #[must_use]
    pub fn from_env() -> Self
    {
        let format = env::var(LOG_FORMAT_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let file = env::var(LOG_FILE_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Self {
            format,
            level: None,
            file,
        }
    }

    /// Force a level, ignoring `RUST_LOG`
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    /// Build the event filter
    ///
    /// Priority: an explicit level, then `RUST_LOG`, then `info`.
    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    }

    /// Install the global subscriber
    ///
    /// ## Errors
    ///
    /// Returns an error if a subscriber is already installed or the log
    /// file directory cannot be created.
    pub fn init(&self) -> Result<(), LoggingError>
    {
        let mut layers: Vec<BoxedLayer> = vec![console_layer(self.format, self.filter())];

        if let Some(path) = &self.file {
            let directory = path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InitializationFailed(format!("`{}` is not a file path", path.display())))?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The subscriber lives for the whole process, so must the writer.
            std::mem::forget(guard);
            layers.push(file_layer(self.format, writer, self.filter()));
        }

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|error| LoggingError::InitializationFailed(error.to_string()))
    }
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => layer.with_ansi(true).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(false).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Initialize logging from the environment
///
/// ## Example
///
/// ```rust,no_run
/// use symscope_utils::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging() -> Result<(), LoggingError>
{
    LoggingConfig::from_env().init()
}

/// Initialize logging with an explicit level and format
///
/// `SYMSCOPE_LOG_FILE` is still honored.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    LoggingConfig::from_env().with_level(level).with_format(format).init()
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
