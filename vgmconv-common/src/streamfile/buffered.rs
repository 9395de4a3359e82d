//! Buffered random-access reads over one host handle
//!
//! [`BufferedStream`] keeps a logical cursor and one contiguous read-ahead
//! window. Reads inside the window are served from memory; a miss issues a
//! single host `seek + read` of up to the cache capacity at the requested
//! offset and replaces the whole window.
//!
//! The host handle is a [`SharedHandle`]: several streams may reference the
//! same handle (see the duplication path in
//! [`FileStream::open`](super::FileStream)), each with its own cursor and
//! window. The handle is released when the last stream referencing it closes.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{trace, warn};

use super::Whence;
use crate::host::HostFile;
use crate::Result;

/// Host handle shared between duplicated streams.
#[derive(Clone)]
pub(crate) struct SharedHandle(Arc<Mutex<Box<dyn HostFile>>>);

impl SharedHandle {
    pub(crate) fn new(file: Box<dyn HostFile>) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn HostFile>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of streams currently referencing the handle
    pub(crate) fn references(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHandle")
            .field("references", &self.references())
            .finish()
    }
}

/// Cursor plus read-ahead cache over one host handle.
#[derive(Debug)]
pub struct BufferedStream {
    /// `None` for handle-less (virtual) streams and after `close`
    handle: Option<SharedHandle>,
    name: String,
    /// Logical cursor, always within `[0, file_size]`
    offset: u64,
    /// Start of the cached window
    buf_offset: u64,
    buf: Vec<u8>,
    /// Valid bytes in `buf`, starting at `buf_offset`
    valid_size: usize,
    file_size: u64,
}

impl BufferedStream {
    /// Wrap `handle` with a cache of `buffer_size` bytes.
    ///
    /// The file size is queried once here and cached.
    pub(crate) fn new(
        handle: Option<SharedHandle>,
        name: String,
        buffer_size: usize,
    ) -> Result<Self> {
        let file_size = match &handle {
            Some(handle) => handle.lock().size()?,
            None => 0,
        };

        Ok(Self {
            handle,
            name,
            offset: 0,
            buf_offset: 0,
            buf: vec![0u8; buffer_size.max(1)],
            valid_size: 0,
            file_size,
        })
    }

    /// Read up to `dst.len()` bytes at the cursor and advance it.
    ///
    /// Returns fewer bytes when the request crosses end of file or the host
    /// comes up short; nothing is retried or zero-padded.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        if self.handle.is_none() || dst.is_empty() {
            return 0;
        }

        let mut read_total = 0;

        // part of the request already in the window
        let window_end = self.buf_offset + self.valid_size as u64;
        if self.offset >= self.buf_offset && self.offset < window_end {
            let buf_into = (self.offset - self.buf_offset) as usize;
            let buf_limit = (self.valid_size - buf_into).min(dst.len());

            dst[..buf_limit].copy_from_slice(&self.buf[buf_into..buf_into + buf_limit]);
            read_total += buf_limit;
            self.offset += buf_limit as u64;
        }

        // rest of the request through fresh windows
        while read_total < dst.len() {
            if self.offset >= self.file_size {
                break;
            }

            let filled = match self.refill() {
                Ok(filled) => filled,
                Err(e) => {
                    warn!("{}: host read at 0x{:x} failed: {}", self.name, self.offset, e);
                    break;
                }
            };

            let buf_limit = (dst.len() - read_total).min(self.buf.len());

            // partial window (EOF or host shortfall): hand out what we got
            if filled < buf_limit {
                dst[read_total..read_total + filled].copy_from_slice(&self.buf[..filled]);
                read_total += filled;
                self.offset += filled as u64;
                break;
            }

            dst[read_total..read_total + buf_limit].copy_from_slice(&self.buf[..buf_limit]);
            read_total += buf_limit;
            self.offset += buf_limit as u64;
        }

        read_total
    }

    /// Replace the window with host data starting at the cursor.
    fn refill(&mut self) -> std::io::Result<usize> {
        self.buf_offset = self.offset;
        self.valid_size = 0;

        let Some(handle) = self.handle.as_ref() else {
            return Ok(0);
        };

        let mut file = handle.lock();
        file.seek(self.offset)?;
        let read = file.read(&mut self.buf)?;

        // never cache past the size captured at open
        let remaining = (self.file_size - self.offset) as usize;
        self.valid_size = read.min(remaining).min(self.buf.len());

        trace!(
            "{}: cache window 0x{:x}+0x{:x}",
            self.name,
            self.buf_offset,
            self.valid_size
        );
        Ok(self.valid_size)
    }

    /// Move the cursor, clamping the result into `[0, file_size]`.
    ///
    /// Never fails and never touches the cache. Returns the new cursor.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> u64 {
        let base: i128 = match whence {
            Whence::Set => 0,
            Whence::Cur => self.offset as i128,
            Whence::End => self.file_size as i128,
        };
        let target = (base + offset as i128).clamp(0, self.file_size as i128);
        self.offset = target as u64;
        self.offset
    }

    /// Current cursor
    pub fn tell(&self) -> u64 {
        self.offset
    }

    /// File size captured at open
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// Logical display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The shared host handle, while open
    pub(crate) fn handle(&self) -> Option<&SharedHandle> {
        self.handle.as_ref()
    }

    /// Drop this stream's reference to the host handle and free the cache.
    ///
    /// Safe to call more than once; the host handle itself is released when
    /// the last referencing stream lets go of it.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!("{}: closing ({} references)", self.name, handle.references());
        }
        self.buf = Vec::new();
        self.valid_size = 0;
    }
}
