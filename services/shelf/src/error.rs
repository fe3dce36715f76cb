//! services/shelf/src/error.rs
//!
//! Defines the primary error type for the `shelf` service.

use crate::config::ConfigError;
use shelf_core::ports::PortError;

/// The primary error type for the `shelf` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents a failure to build the HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input given on the command line.
    #[error("{0}")]
    Usage(String),
}
