//! Buffered stream media source for Symphonia.
//!
//! Wraps a [`StreamFile`] so symphonia's probe and format readers pull bytes
//! through the stream's read-ahead cache.

use std::io::{self, Read, Seek, SeekFrom};

use symphonia::core::io::MediaSource;
use vgmconv_common::{StreamFile, Whence};

/// A media source wrapper around a boxed [`StreamFile`].
pub struct StreamFileSource(Box<dyn StreamFile>);

impl StreamFileSource {
    pub fn new(stream: Box<dyn StreamFile>) -> Self {
        Self(stream)
    }
}

impl From<Box<dyn StreamFile>> for StreamFileSource {
    fn from(value: Box<dyn StreamFile>) -> Self {
        Self(value)
    }
}

impl Read for StreamFileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.0.read(buf))
    }
}

impl Seek for StreamFileSource {
    /// Seeks are clamped into the file like host seeks, so they never fail.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => self.0.seek(offset.min(i64::MAX as u64) as i64, Whence::Set),
            SeekFrom::Current(offset) => self.0.seek(offset, Whence::Cur),
            SeekFrom::End(offset) => self.0.seek(offset, Whence::End),
        };
        Ok(new_pos)
    }
}

impl MediaSource for StreamFileSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.0.size())
    }
}

impl Drop for StreamFileSource {
    fn drop(&mut self) {
        self.0.close();
    }
}
