//! # vgmconv Common Library
//!
//! Shared code for the vgmconv tools:
//! - Host file service abstraction (real filesystem and in-memory)
//! - Buffered random-access streams with a read-ahead cache window
//! - Archive-qualified path rewriting for companion-file lookups
//! - Stream factory that picks the right stream variant per path

pub mod error;
pub mod host;
pub mod streamfile;

pub use error::{Error, Result};
pub use host::{HostFile, HostFileSystem, MemoryFileSystem, StdFileSystem};
pub use streamfile::{StreamFactory, StreamFile, StreamOptions, Whence};
