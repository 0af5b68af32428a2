//! Error handling for the router.

use crate::config::ConfigError;

/// Router error type.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
