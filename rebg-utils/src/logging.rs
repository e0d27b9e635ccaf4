//! Logging setup for rebg-sync binaries
//!
//! Everything logs through `tracing`. The filter comes from `REBG_LOG` when
//! set, and output goes to stderr, to `rebg.log` under the log directory,
//! or both.

use std::fs::{File, OpenOptions};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, RebgError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "REBG_LOG";

const DEFAULT_LOG_FILE: &str = "rebg.log";

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Append to a file in the log directory
    File,
    Both,
}

impl LogOutput {
    fn stderr(self) -> bool {
        matches!(self, LogOutput::Stderr | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directives, e.g. "info" or "rebg_client=debug,tungstenite=warn"
    pub filter: String,
    /// Tag lines with source file and line
    pub file_line: bool,
    /// Log file name inside the log directory
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: filter_from_env("info"),
            file_line: false,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Preset for the watch client. Stdout carries cell updates, so only
    /// warnings reach stderr unless `REBG_LOG` says otherwise.
    pub fn client() -> Self {
        Self {
            filter: filter_from_env("warn"),
            ..Self::default()
        }
    }

    /// Verbose stderr output with source locations
    pub fn development() -> Self {
        Self {
            filter: filter_from_env("debug"),
            file_line: true,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }
}

fn filter_from_env(fallback: &str) -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| fallback.to_owned())
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber described by `config`
///
/// Fails on an unparsable filter, an unwritable log file, or if a
/// subscriber is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| RebgError::config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let stderr_layer = config.output.stderr().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(config.file_line)
            .with_line_number(config.file_line)
    });

    let file_layer = if config.output.file() {
        let file = open_log_file(config.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE))?;
        Some(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_file(config.file_line)
                .with_line_number(config.file_line),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| RebgError::internal(format!("Failed to init logging: {}", e)))
}

fn open_log_file(file_name: &str) -> Result<File> {
    let dir = paths::log_dir();
    paths::ensure_dir(&dir).map_err(|e| RebgError::FileWrite {
        path: dir.clone(),
        source: e,
    })?;

    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| RebgError::FileWrite { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_targets() {
        assert!(LogOutput::Stderr.stderr() && !LogOutput::Stderr.file());
        assert!(!LogOutput::File.stderr() && LogOutput::File.file());
        assert!(LogOutput::Both.stderr() && LogOutput::Both.file());
    }

    #[test]
    fn test_presets() {
        // Filters depend on REBG_LOG, so only the fixed parts are checked
        let config = LogConfig::client();
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(!config.file_line);

        let config = LogConfig::development();
        assert!(config.file_line);
        assert!(config.file_name.is_none());
    }

    #[test]
    fn test_builders() {
        let config = LogConfig::development()
            .with_filter("trace")
            .with_output(LogOutput::Both);
        assert_eq!(config.filter, "trace");
        assert_eq!(config.output, LogOutput::Both);
        assert!(config.file_line);
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LogConfig::default().with_filter("rebg=[[[");
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(RebgError::Config(_))));
    }
}
