//! Error types for vgmconv-cli
//!
//! Configuration errors are fatal to the whole invocation. Every other kind
//! aborts only the current (input, sub-stream) item; the batch continues.

use thiserror::Error;

/// Main error type for the conversion tool
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or conflicting configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host stream errors (file not found, open/read failure)
    #[error("Stream error: {0}")]
    Stream(#[from] vgmconv_common::Error),

    /// Output file I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoding engine could not open or parse the input
    #[error("Format error: {0}")]
    Format(String),

    /// Opened stream does not satisfy the requested settings
    #[error("Validation error: {0}")]
    Validation(String),

    /// Decoding failed mid-stream
    #[error("Audio decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the error should abort the whole invocation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Convenience Result type using the vgmconv-cli Error
pub type Result<T> = std::result::Result<T, Error>;
