//! Structured logging utilities shared by the coordinator and worker.
//!
//! Provides consistent logging with component prefixes and structured
//! fields.
//!
//! # Usage
//!
//! ```ignore
//! use fsched_config::logging::*;
//!
//! log_coordinator_info!("Dispatched file", rank = 2, path = "a.sen");
//! log_worker_debug!("Processing line", path = "a.sen");
//! ```

/// Component identifiers for log filtering.
pub struct Component;

impl Component {
    pub const COORDINATOR: &'static str = "COORDINATOR";
    pub const WORKER: &'static str = "WORKER";
    pub const SCHEDULER: &'static str = "SCHEDULER";
    pub const PROTOCOL: &'static str = "PROTOCOL";
}

/// Log levels for runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Derive a level from a repeated `-v` flag count, the way both
    /// binaries' CLIs expose verbosity.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === COORDINATOR logging macros ===

#[macro_export]
macro_rules! log_coordinator_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_coordinator_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_coordinator_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

// === WORKER logging macros ===

#[macro_export]
macro_rules! log_worker_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "WORKER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_worker_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "WORKER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_worker_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "WORKER", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter. Call once at process
/// startup. `RUST_LOG` always takes priority over `level` when set.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
