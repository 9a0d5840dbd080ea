//! Subscriber setup for applications embedding the store.
//!
//! The store itself only emits `tracing` events inside its own span; it never
//! installs a subscriber. Applications call [`init`] once at startup to get
//! human-readable console output plus JSON log files rotated by
//! `tracing-appender`.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Crate targets that get their own, more verbose, filter directives.
const CRATE_TARGETS: [&str; 2] = ["shelf", "shelf_core"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files.
    pub log_directory: PathBuf,
    /// Log file name prefix (`shelf` gives `shelf.2026-01-15.log`).
    pub log_file_prefix: String,
    /// Most verbose level printed to the console for crate targets.
    pub console_level: Level,
    /// Most verbose level written to files for crate targets.
    pub file_level: Level,
    /// How often to start a new log file.
    pub rotation: LogRotation,
    /// Old log files to keep; 0 keeps everything.
    pub max_log_files: usize,
    /// ANSI colours on the console.
    pub console_ansi: bool,
    /// Include source file and line.
    pub include_file_line: bool,
    /// Include the event target.
    pub include_target: bool,
    /// Emit span open/close events, e.g. around each store operation.
    pub log_span_events: bool,
}

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Every minute.
    Minutely,
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Single file.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Self::MINUTELY,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Verbose settings for debug builds.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_file_prefix: "shelf".to_string(),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            rotation: LogRotation::Hourly,
            max_log_files: 24,
            console_ansi: true,
            include_file_line: true,
            include_target: true,
            log_span_events: true,
        }
    }

    /// Quiet console, daily files kept for a week.
    #[must_use]
    pub fn production() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_file_prefix: "shelf".to_string(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
            max_log_files: 7,
            console_ansi: true,
            include_file_line: false,
            include_target: false,
            log_span_events: false,
        }
    }

    /// [`LoggingConfig::development`] in debug builds, otherwise production.
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Set the log directory.
    #[must_use]
    pub fn with_log_directory(mut self, path: PathBuf) -> Self {
        self.log_directory = path;
        self
    }

    /// Set the log file prefix.
    #[must_use]
    pub fn with_log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    /// Set the console level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Set the file level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Set the rotation frequency.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set how many rotated files to keep.
    #[must_use]
    pub const fn with_max_log_files(mut self, max: usize) -> Self {
        self.max_log_files = max;
        self
    }
}

/// Keeps the background file writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the console filter when set.
///
/// # Errors
///
/// Fails if the log directory can't be created, the file appender can't be
/// built, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    if !config.log_directory.exists() {
        std::fs::create_dir_all(&config.log_directory).map_err(|e| {
            LoggingError::DirectoryCreationFailed {
                path: config.log_directory.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    let mut appender = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.log_file_prefix)
        .filename_suffix("log");
    if config.max_log_files > 0 {
        appender = appender.max_log_files(config.max_log_files);
    }
    let appender = appender
        .build(&config.log_directory)
        .map_err(|e| LoggingError::AppenderFailed(e.to_string()))?;
    let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);

    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => crate_filter(Level::WARN, config.console_level)?,
    };
    let file_filter = crate_filter(Level::INFO, config.file_level)?;

    let span_events = if config.log_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console_layer = fmt::layer()
        .with_ansi(config.console_ansi)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events.clone())
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .json()
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// [`init`] with [`LoggingConfig::auto`].
pub fn init_auto() -> Result<LoggingGuard, LoggingError> {
    init(&LoggingConfig::auto())
}

/// Default log directory under the platform data directory.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
        .join("logs")
}

/// `default` for everything else, `crate_level` for the crate targets.
fn crate_filter(default: Level, crate_level: Level) -> Result<EnvFilter, LoggingError> {
    let mut filter = EnvFilter::new(level_to_directive(default));
    for target in CRATE_TARGETS {
        filter = filter.add_directive(directive(target, crate_level)?);
    }
    Ok(filter)
}

fn directive(target: &str, level: Level) -> Result<Directive, LoggingError> {
    let raw = format!("{target}={}", level_to_directive(level));
    raw.parse()
        .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidFilter {
            directive: raw.clone(),
            reason: e.to_string(),
        })
}

const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The rolling file appender could not be built.
    #[error("Failed to open log file: {0}")]
    AppenderFailed(String),

    /// A filter directive did not parse.
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}
