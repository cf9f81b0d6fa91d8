//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

use caldemo_core::{DemoError, TracingError};

/// Result type for the binary.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the binary before exiting.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read settings {}: {source}", .path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings {}: {source}", .path.display())]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error(transparent)]
    Demo(#[from] DemoError),
}
