//! Central error types for sapflow.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum SapflowError {
    /// Requested language is not registered
    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    /// Source input is empty or whitespace-only
    #[error("Empty source input")]
    EmptySource,

    /// The parser produced no usable tree
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Tree-sitter query compilation error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// A structural invariant of the CFG was violated after post-processing.
    /// This indicates a bug in a language visitor, not bad input.
    #[error("CFG invariant violated: {0}")]
    Invariant(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO operation failed (binary only; the library itself does no IO)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using SapflowError.
pub type Result<T> = std::result::Result<T, SapflowError>;

impl SapflowError {
    /// Create a parse error with a message.
    #[inline]
    pub fn parse(message: impl Into<String>) -> Self {
        SapflowError::Parse {
            message: message.into(),
        }
    }
}
