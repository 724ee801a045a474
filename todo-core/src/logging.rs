//! Unified logging system
//!
//! Structured logging through `tracing`, plus the payload redaction policy that
//! keeps claim contents out of production logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Placeholder written in place of log payloads outside development mode
pub const REDACTED: &str = "<REDACTED>";

/// Operating mode that decides how much detail reaches the logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Full payloads are logged
    Development,
    /// Everything beyond the primary message is redacted
    #[default]
    Production,
}

impl LogMode {
    /// Resolve the mode from an `APP_ENV` style value
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "development" || v == "dev" => LogMode::Development,
            _ => LogMode::Production,
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogMode::Development => write!(f, "development"),
            LogMode::Production => write!(f, "production"),
        }
    }
}

/// Decides whether a log field is written verbatim or replaced by [`REDACTED`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPolicy {
    mode: LogMode,
}

impl LogPolicy {
    pub fn new(mode: LogMode) -> Self {
        Self { mode }
    }

    pub fn development() -> Self {
        Self::new(LogMode::Development)
    }

    pub fn production() -> Self {
        Self::new(LogMode::Production)
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// Render a payload value according to the current mode
    pub fn redact<T: fmt::Display>(&self, value: T) -> Redacted<T> {
        Redacted {
            value,
            visible: self.mode == LogMode::Development,
        }
    }
}

/// Display wrapper produced by [`LogPolicy::redact`]
pub struct Redacted<T> {
    value: T,
    visible: bool,
}

impl<T: fmt::Display> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.visible {
            self.value.fmt(f)
        } else {
            f.write_str(REDACTED)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            filter_directives: vec![
                "todo_web=info".to_string(),
                "todo_service=info".to_string(),
                "tower_http=info".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Development defaults: verbose, human readable
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            include_thread: false,
            filter_directives: vec![
                "todo_web=debug".to_string(),
                "todo_service=debug".to_string(),
                "tower_http=debug".to_string(),
            ],
        }
    }

    /// Defaults matching a [`LogMode`]
    pub fn for_mode(mode: LogMode) -> Self {
        match mode {
            LogMode::Development => Self::development(),
            LogMode::Production => Self::default(),
        }
    }
}

/// Initialize the logging system
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_fmt::layer()
                .json()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_writer(io::stdout);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_fmt::layer()
                .pretty()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_writer(io::stdout);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_fmt::layer()
                .compact()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_writer(io::stdout);
            registry.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

/// Logging macros for common patterns
#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "Starting operation"
        );
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(
            operation = $operation,
            $($field)*,
            "Starting operation"
        );
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr) => {
        tracing::info!(
            operation = $operation,
            "Operation completed successfully"
        );
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info!(
            operation = $operation,
            $($field)*,
            "Operation completed successfully"
        );
    };
}

#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "Operation failed"
        );
    };
    ($operation:expr, $error:expr, $($field:tt)*) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            $($field)*,
            "Operation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_policy_redacts_payloads() {
        let policy = LogPolicy::production();
        assert_eq!(policy.redact("user-42").to_string(), REDACTED);
        assert_eq!(policy.redact(299).to_string(), REDACTED);
    }

    #[test]
    fn test_development_policy_keeps_payloads() {
        let policy = LogPolicy::development();
        assert_eq!(policy.redact("user-42").to_string(), "user-42");
    }

    #[test]
    fn test_log_mode_from_env_value() {
        assert_eq!(LogMode::from_env_value(Some("development")), LogMode::Development);
        assert_eq!(LogMode::from_env_value(Some(" Dev ")), LogMode::Development);
        assert_eq!(LogMode::from_env_value(Some("production")), LogMode::Production);
        assert_eq!(LogMode::from_env_value(None), LogMode::Production);
    }
}
