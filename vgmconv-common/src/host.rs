//! Host file service
//!
//! The buffered streams never touch the filesystem directly. They go through
//! [`HostFileSystem`], which answers `exists`/`open`, and [`HostFile`], which
//! provides positioned reads on one open handle. A handle is released when its
//! `HostFile` value is dropped.
//!
//! Two implementations are provided:
//! - [`StdFileSystem`]: plain `std::fs` access, paths used verbatim
//! - [`MemoryFileSystem`]: in-memory files with open/read/release counters,
//!   used to observe caching and handle bookkeeping

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

/// One open host file handle.
pub trait HostFile: Send {
    /// Read up to `buf.len()` bytes at the current host position.
    ///
    /// Returns fewer bytes only at end of file or on a host shortfall.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Position the host handle at an absolute offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Total size of the file in bytes.
    fn size(&mut self) -> io::Result<u64>;
}

/// Host services for locating and opening files.
pub trait HostFileSystem: Send + Sync {
    /// Check whether `path` names an existing file.
    fn exists(&self, path: &str) -> bool;

    /// Open `path` for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn HostFile>>;
}

/// Host file service backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl HostFileSystem for StdFileSystem {
    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).is_file()
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn HostFile>> {
        let file = File::open(path)?;
        Ok(Box::new(StdFile(file)))
    }
}

struct StdFile(File);

impl HostFile for StdFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // std reads may return short counts mid-file; keep going until EOF
        let mut total = 0;
        while total < buf.len() {
            match self.0.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.0.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.0.metadata()?.len())
    }
}

/// Counters shared by a [`MemoryFileSystem`] and every handle it opened.
#[derive(Debug, Default)]
struct HostCounters {
    opens: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
}

/// In-memory host file service.
///
/// Files are registered with [`MemoryFileSystem::insert`]. Every open, host
/// read and handle release is counted so callers can verify that cached reads
/// skip host I/O and that shared handles are released exactly once.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>,
    counters: Arc<HostCounters>,
    read_limit: Option<usize>,
}

impl MemoryFileSystem {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every host read at `limit` bytes, simulating a host I/O shortfall.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    /// Register (or replace) a file
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        let mut files = match self.files.lock() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.insert(path.into(), Arc::new(data.into()));
    }

    /// Number of successful `open` calls
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Number of host-level reads issued on any handle
    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Number of handles released
    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// Handles opened but not yet released
    pub fn live_handles(&self) -> usize {
        self.opens() - self.releases()
    }

    fn lookup(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        let files = match self.files.lock() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.get(path).cloned()
    }
}

impl HostFileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn HostFile>> {
        let data = self
            .lookup(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        trace!("memory host: opened {}", path);
        Ok(Box::new(MemoryFile {
            data,
            pos: 0,
            counters: Arc::clone(&self.counters),
            read_limit: self.read_limit,
        }))
    }
}

struct MemoryFile {
    data: Arc<Vec<u8>>,
    pos: u64,
    counters: Arc<HostCounters>,
    read_limit: Option<usize>,
}

impl HostFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let start = (self.pos as usize).min(self.data.len());
        let mut n = buf.len().min(self.data.len() - start);
        if let Some(limit) = self.read_limit {
            n = n.min(limit);
        }
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
