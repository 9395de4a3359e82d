//! Random-access streams handed to the decoding engine
//!
//! Every stream satisfies [`StreamFile`]. The factory picks one of two
//! variants when a path is opened:
//! - [`FileStream`]: an ordinary path
//! - [`ArchiveStream`]: a member of an archive, named through [`ArchivePath`]
//!
//! Both wrap a [`BufferedStream`] for the actual cursor/cache work and only
//! differ in naming and in how related (companion) files are opened.

mod archive;
mod buffered;
mod factory;

pub use archive::ArchivePath;
pub use buffered::BufferedStream;
pub use factory::{StreamFactory, StreamOptions, VirtualNames, DEFAULT_BUFFER_SIZE};

use tracing::debug;

use crate::Result;

/// Origin for [`StreamFile::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset
    Set,
    /// Relative to the current cursor
    Cur,
    /// Relative to the end of file (usually negative)
    End,
}

/// Capability contract shared by all stream variants.
pub trait StreamFile: Send + Sync {
    /// Read up to `dst.len()` bytes at the cursor; returns the count read.
    fn read(&mut self, dst: &mut [u8]) -> usize;

    /// Move the cursor (clamped into `[0, size]`); returns the new cursor.
    fn seek(&mut self, offset: i64, whence: Whence) -> u64;

    /// Current cursor
    fn tell(&self) -> u64;

    /// File size captured at open
    fn size(&self) -> u64;

    /// Logical name, used by decoders to derive companion file names
    fn name(&self) -> &str;

    /// Open a second, independent stream for a file related to this one.
    fn open(&self, related: &str) -> Result<Box<dyn StreamFile>>;

    /// Release the host handle reference and the cache. Idempotent.
    fn close(&mut self);
}

/// Stream over an ordinary (non-archive) path.
#[derive(Debug)]
pub struct FileStream {
    inner: BufferedStream,
    factory: StreamFactory,
}

impl FileStream {
    pub(crate) fn new(inner: BufferedStream, factory: StreamFactory) -> Self {
        Self { inner, factory }
    }
}

impl StreamFile for FileStream {
    fn read(&mut self, dst: &mut [u8]) -> usize {
        self.inner.read(dst)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> u64 {
        self.inner.seek(offset, whence)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&self, related: &str) -> Result<Box<dyn StreamFile>> {
        // same name: share the open handle instead of asking the host again
        if related == self.inner.name() {
            if let Some(handle) = self.inner.handle() {
                match self.factory.wrap_handle(Some(handle.clone()), related) {
                    Ok(stream) => {
                        debug!("{}: duplicated open handle", related);
                        return Ok(stream);
                    }
                    Err(e) => debug!("{}: handle duplication failed ({}), reopening", related, e),
                }
            }
        }

        self.factory.open(related)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Stream over a member of an archive.
///
/// Reports the rewritten logical name and maps companion names back into the
/// archive before opening them.
#[derive(Debug)]
pub struct ArchiveStream {
    inner: BufferedStream,
    path: ArchivePath,
    factory: StreamFactory,
}

impl ArchiveStream {
    pub(crate) fn new(inner: BufferedStream, path: ArchivePath, factory: StreamFactory) -> Self {
        Self {
            inner,
            path,
            factory,
        }
    }

    /// Offsets of the archive-qualified path this stream was opened from
    pub fn archive_path(&self) -> &ArchivePath {
        &self.path
    }
}

impl StreamFile for ArchiveStream {
    fn read(&mut self, dst: &mut [u8]) -> usize {
        self.inner.read(dst)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> u64 {
        self.inner.seek(offset, whence)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&self, related: &str) -> Result<Box<dyn StreamFile>> {
        match self.path.companion_path(related) {
            Some(target) => {
                debug!("{}: companion {} -> {}", self.inner.name(), related, target);
                self.factory.open(&target)
            }
            None => self.factory.open(related),
        }
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
