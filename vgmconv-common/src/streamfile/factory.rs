//! Stream construction
//!
//! [`StreamFactory`] opens host files and wraps them in the right
//! [`StreamFile`] variant. Streams keep a clone of the factory so they can
//! open companion files through the same host service and options.

use std::sync::Arc;

use tracing::debug;

use super::buffered::{BufferedStream, SharedHandle};
use super::{ArchivePath, ArchiveStream, FileStream, StreamFile};
use crate::host::HostFileSystem;
use crate::{Error, Result};

/// Default read-ahead cache size per stream
pub const DEFAULT_BUFFER_SIZE: usize = 0x8000;

/// Predicate for names that may be opened without an existing host file
pub type VirtualNames = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Options applied to every stream a factory opens.
#[derive(Clone)]
pub struct StreamOptions {
    /// Read-ahead cache size in bytes
    pub buffer_size: usize,

    /// Only paths starting with this scheme are treated as archive members.
    /// `None` accepts any `<scheme>://...|member` path.
    pub archive_scheme: Option<String>,

    /// Names accepted as handle-less streams when the host file is missing
    pub virtual_names: Option<VirtualNames>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            archive_scheme: None,
            virtual_names: None,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("buffer_size", &self.buffer_size)
            .field("archive_scheme", &self.archive_scheme)
            .field("virtual_names", &self.virtual_names.is_some())
            .finish()
    }
}

/// Opens buffered streams through a host file service.
#[derive(Clone)]
pub struct StreamFactory {
    fs: Arc<dyn HostFileSystem>,
    options: StreamOptions,
}

impl StreamFactory {
    /// Create a factory with default options
    pub fn new(fs: Arc<dyn HostFileSystem>) -> Self {
        Self::with_options(fs, StreamOptions::default())
    }

    /// Create a factory with explicit options
    pub fn with_options(fs: Arc<dyn HostFileSystem>, options: StreamOptions) -> Self {
        Self { fs, options }
    }

    /// Options in effect
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Open `path` as a buffered stream.
    ///
    /// # Errors
    /// - `NotFound` if the host has no such file and the name is not virtual
    /// - `Io` if the host open or size query fails
    pub fn open(&self, path: &str) -> Result<Box<dyn StreamFile>> {
        let handle = if self.fs.exists(path) {
            Some(SharedHandle::new(self.fs.open(path)?))
        } else if self.is_virtual(path) {
            debug!("{}: opening as virtual stream", path);
            None
        } else {
            return Err(Error::NotFound(path.to_string()));
        };

        self.wrap_handle(handle, path)
    }

    /// Build a stream around an already open (or absent) handle.
    pub(crate) fn wrap_handle(
        &self,
        handle: Option<SharedHandle>,
        path: &str,
    ) -> Result<Box<dyn StreamFile>> {
        let buffer_size = self.options.buffer_size;

        match ArchivePath::parse(path, self.options.archive_scheme.as_deref()) {
            Some(archive) => {
                let inner = BufferedStream::new(handle, archive.logical_name(), buffer_size)?;
                debug!("{}: archive member, logical name {}", path, inner.name());
                Ok(Box::new(ArchiveStream::new(inner, archive, self.clone())))
            }
            None => {
                let inner = BufferedStream::new(handle, path.to_string(), buffer_size)?;
                Ok(Box::new(FileStream::new(inner, self.clone())))
            }
        }
    }

    fn is_virtual(&self, path: &str) -> bool {
        self.options
            .virtual_names
            .as_ref()
            .map(|is_virtual| is_virtual(path))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for StreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFactory")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
