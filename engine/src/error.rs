//! Error types for the urlstate engine.

use crate::QueryKey;
use thiserror::Error;

/// All possible errors from the urlstate engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("no adapter provides `{field}`: pass it to the binding or share one through an AdapterContext")]
    MissingAdapter { field: &'static str },

    // Codec errors
    #[error("cannot deserialize query param '{key}': {reason}")]
    Deserialize { key: QueryKey, reason: String },

    #[error("invalid query string: {0}")]
    InvalidQueryString(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    // Driver errors
    #[error("bindings did not settle after {cycles} cycles")]
    NotSettled { cycles: usize },
}

impl Error {
    /// Deserialization failure raised by a codec.
    ///
    /// Codecs do not know which key they are decoding; the registry fills
    /// the key in before the error leaves [`crate::param`].
    pub fn parse(reason: impl Into<String>) -> Self {
        Error::Deserialize {
            key: QueryKey::new(),
            reason: reason.into(),
        }
    }

    pub(crate) fn with_key(self, key: &str) -> Self {
        match self {
            Error::Deserialize { reason, .. } => Error::Deserialize {
                key: key.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
