//! Error types for folio operations.

use thiserror::Error;

/// Errors that can occur while decoding filtered data or reading containers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt encoded data, reported by the codec that found it.
    #[error("{codec}: {reason}")]
    Filter { codec: &'static str, reason: String },

    #[error("Invalid MOBI: {0}")]
    InvalidMobi(String),

    /// Object syntax error from the textual parser.
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Shorthand for a codec-tagged format error.
    pub fn filter(codec: &'static str, reason: impl Into<String>) -> Self {
        Error::Filter {
            codec,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
