//! Logging setup on top of the tracing ecosystem

use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{DstatError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "DSTAT_LOG";

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Operator-facing stderr
    Stderr,
    /// Append to a file
    File(PathBuf),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Filter directive, e.g. "info" or "dstat=debug"
    pub filter: String,
    /// Include file/line in records
    pub file_line: bool,
}

impl LogConfig {
    /// Long-running server: info by default
    pub fn server(log_file: Option<PathBuf>) -> Self {
        Self {
            output: log_file.map_or(LogOutput::Stderr, LogOutput::File),
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            file_line: true,
        }
    }

    /// One-shot client and stdout modes: quiet unless something is wrong
    pub fn client(log_file: Option<PathBuf>) -> Self {
        Self {
            output: log_file.map_or(LogOutput::Stderr, LogOutput::File),
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            file_line: false,
        }
    }
}

/// Install the global subscriber
pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| DstatError::Logging(format!("invalid filter '{}': {}", config.filter, e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    match config.output {
        LogOutput::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| DstatError::Logging(e.to_string())),
        LogOutput::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| DstatError::Logging(format!("{}: {}", path.display(), e)))?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| DstatError::Logging(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LogConfig {
            output: LogOutput::Stderr,
            filter: "dstat=loud".into(),
            file_line: false,
        };
        assert!(matches!(init_logging(config), Err(DstatError::Logging(_))));
    }

    #[test]
    fn test_log_file_selects_file_output() {
        let path = PathBuf::from("/tmp/dstat.log");
        let config = LogConfig::server(Some(path.clone()));
        assert_eq!(config.output, LogOutput::File(path));
        assert_eq!(LogConfig::client(None).output, LogOutput::Stderr);
    }
}
