//! rebg-utils: Shared utilities for the rebg-sync crates
//!
//! Error type, logging setup and XDG path helpers.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{RebgError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
pub use paths::{config_dir, config_file, ensure_dir, log_dir, state_dir};
