//! Logger bootstrap
//!
//! Everything logs through the `log` facade; `env_logger` is the sink. The
//! level chosen here is only a default: `RUST_LOG` always wins.

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level
    Error = 4,
}

impl LogLevel {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// `debug` when asked for debugging, `info` otherwise
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    /// Filter directive understood by `env_logger`
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install the global logger. Returns false if one was already installed.
pub fn init(level: LogLevel) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.directive()))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
