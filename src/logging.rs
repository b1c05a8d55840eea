//! Logging infrastructure for ClipSync
//!
//! Structured logging through the tracing crate. `RUST_LOG` overrides the
//! level chosen on the command line.

use tracing_subscriber::{fmt, EnvFilter};

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - chunk accounting
    Trace,
    /// Debug level - frame sizes and state changes
    Debug,
    /// Info level - sync events
    #[default]
    Info,
    /// Warn level - dropped messages
    Warn,
    /// Error level - errors only
    Error,
}

impl LogLevel {
    /// Converts LogLevel to tracing level filter string
    fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Maps a `-v` repeat count to a level
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Default filter directive scoped to this crate
    fn directive(&self) -> String {
        format!("clip_sync={}", self.as_filter_str())
    }
}

/// Initializes the logging system
///
/// Sets up a tracing subscriber with the specified log level.
/// Can be overridden by the RUST_LOG environment variable.
///
/// # Examples
///
/// ```no_run
/// use clip_sync::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
