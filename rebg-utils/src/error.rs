//! Error types for rebg-sync
//!
//! Transport and frame failures never become `RebgError`s; the client
//! recovers from those and reports them as diagnostics. What remains is
//! setup: reading config, opening log files, installing the subscriber.

use std::path::PathBuf;

/// Error type for rebg-sync setup operations
#[derive(Debug, thiserror::Error)]
pub enum RebgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RebgError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors caused by the config file or its values
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ConfigInvalid { .. } | Self::ConfigNotFound(_)
        )
    }
}

/// Result type alias using RebgError
pub type Result<T> = std::result::Result<T, RebgError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_file_read_display_names_path() {
        let err = RebgError::FileRead {
            path: PathBuf::from("/etc/rebg/config.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to read file /etc/rebg/config.toml"));
        assert!(msg.ends_with("permission denied"));
    }

    #[test]
    fn test_config_invalid_display() {
        let err = RebgError::ConfigInvalid {
            path: PathBuf::from("config.toml"),
            message: "expected a value".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration at config.toml: expected a value"
        );
    }

    #[test]
    fn test_io_conversion_keeps_kind() {
        let err: RebgError = io::Error::new(io::ErrorKind::BrokenPipe, "stdin").into();
        match err {
            RebgError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_is_config() {
        assert!(RebgError::config("bad endpoint").is_config());
        assert!(RebgError::ConfigNotFound(PathBuf::from("/missing")).is_config());
        assert!(!RebgError::internal("subscriber already set").is_config());
        assert!(!RebgError::Io(io::Error::new(io::ErrorKind::Other, "x")).is_config());
    }
}
