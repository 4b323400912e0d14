// for error definitions
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortenerError {
    /// Returned when a code already denotes a live link
    #[error("Code already taken: {0}")]
    CodeTaken(String),

    /// No live link for the code (never created, deleted, or expired)
    #[error("Link not found: {0}")]
    NotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

// implement conversions from serde_json::Error to ShortenerError
impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Config(err.to_string())
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, ShortenerError>;
