//! LessDB - Error Types
//! Defines the error hierarchy for the write buffer and block reader.

use thiserror::Error;

/// Custom Result type for lessdb.
pub type Result<T> = std::result::Result<T, LessError>;

/// Error types surfaced by lessdb.
///
/// Only bytes that cross a trust boundary (block contents handed in by a
/// table reader) produce errors. Broken internal invariants panic.
#[derive(Error, Debug)]
pub enum LessError {
    /// I/O errors while loading block contents from a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed block or key bytes.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LessError {
    /// Shorthand for a [`LessError::Corruption`] with a formatted message.
    pub fn corruption(msg: impl Into<String>) -> Self {
        LessError::Corruption(msg.into())
    }

    /// Returns true if this error reports corrupted data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, LessError::Corruption(_))
    }
}
