//! Common error types for vgmconv

use thiserror::Error;

/// Common result type for vgmconv stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening or querying host files
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error from the host file service
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested file does not exist on the host
    #[error("File not found: {0}")]
    NotFound(String),
}
