//! Error types for the mapper
//!
//! One enum per concern. Everything the process cannot start without
//! (config, controller, output device) is fatal and surfaces through
//! [`MapperError`] to the single exit point in `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading the mapping configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Errors from finding and opening physical input devices
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No controller found")]
    NoControllerFound,

    #[error("Failed to open input device {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the virtual output device
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create virtual device: {0}")]
    Create(#[source] std::io::Error),

    #[error("Failed to emit event: {0}")]
    Emit(#[source] std::io::Error),

    #[error("Output device is closed")]
    Closed,
}

/// Errors from translating a single physical event
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Unexpected value {value} for code {code}")]
    UnexpectedValue { code: u16, value: i32 },
}

/// Top-level errors of the mapper process
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Controller device lost")]
    ControllerLost,

    #[error("Polling input devices failed: {0}")]
    Poll(#[source] std::io::Error),

    #[error("Failed to start rapid fire thread: {0}")]
    Thread(#[source] std::io::Error),
}
