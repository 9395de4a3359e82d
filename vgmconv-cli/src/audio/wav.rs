//! WAV header synthesis and little-endian sample layout
//!
//! Output files are a fixed-size RIFF/WAVE header followed by raw samples.
//! The header holds a `fmt ` chunk, an optional `smpl` chunk carrying one
//! forward loop, and the `data` chunk header. Sample data is always written
//! little-endian.

use crate::{Error, Result};

/// Header size without a `smpl` chunk
pub const WAV_HEADER_SIZE: usize = 0x2c;
/// Header size with a `smpl` chunk
pub const WAV_HEADER_SIZE_SMPL: usize = WAV_HEADER_SIZE + 0x44;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const SMPL_CHUNK_BODY: u32 = 0x3c;

/// Fields of the synthesized header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Samples per channel
    pub sample_count: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample
    pub sample_size: u16,
    pub is_float: bool,
    pub write_smpl_chunk: bool,
    pub loop_start: u32,
    /// Inclusive loop end, as stored in `smpl`
    pub loop_end: u32,
}

impl WavHeader {
    /// Size in bytes of the header this describes
    pub fn size(&self) -> usize {
        if self.write_smpl_chunk {
            WAV_HEADER_SIZE_SMPL
        } else {
            WAV_HEADER_SIZE
        }
    }

    /// Size of the sample body
    pub fn data_size(&self) -> u32 {
        self.sample_count
            .saturating_mul(self.channels as u32)
            .saturating_mul(self.sample_size as u32)
    }

    /// Write the header into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    /// - `Validation` if `buf` is too small or the format fields are empty
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        let header_size = self.size();
        if buf.len() < header_size {
            return Err(Error::Validation(format!(
                "wav header needs {} bytes, buffer has {}",
                header_size,
                buf.len()
            )));
        }
        if self.channels == 0 || self.sample_size == 0 || self.sample_rate == 0 {
            return Err(Error::Validation("wav header with empty format".to_string()));
        }

        let data_size = self.data_size();
        let block_align = self.channels * self.sample_size;
        let byte_rate = self.sample_rate * block_align as u32;
        let format_tag = if self.is_float {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        };

        let mut w = HeaderWriter::new(buf);
        w.tag(b"RIFF");
        w.u32((header_size as u32 - 0x08).saturating_add(data_size));
        w.tag(b"WAVE");

        w.tag(b"fmt ");
        w.u32(0x10);
        w.u16(format_tag);
        w.u16(self.channels);
        w.u32(self.sample_rate);
        w.u32(byte_rate);
        w.u16(block_align);
        w.u16(self.sample_size * 8);

        if self.write_smpl_chunk {
            w.tag(b"smpl");
            w.u32(SMPL_CHUNK_BODY);
            w.u32(0); // manufacturer
            w.u32(0); // product
            w.u32(1_000_000_000 / self.sample_rate); // sample period (ns)
            w.u32(60); // MIDI unity note
            w.u32(0); // pitch fraction
            w.u32(0); // SMPTE format
            w.u32(0); // SMPTE offset
            w.u32(1); // loop count
            w.u32(0); // sampler data
            w.u32(0); // cue point id
            w.u32(0); // forward loop
            w.u32(self.loop_start);
            w.u32(self.loop_end);
            w.u32(0); // fraction
            w.u32(0); // play count (infinite)
        }

        w.tag(b"data");
        w.u32(data_size);

        debug_assert_eq!(w.pos, header_size);
        Ok(header_size)
    }
}

struct HeaderWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> HeaderWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn tag(&mut self, tag: &[u8; 4]) {
        self.put(tag);
    }

    fn u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }
}

/// Convert native-endian samples in `buf` to little-endian in place.
///
/// No-op on little-endian hosts.
pub fn swap_samples_le(buf: &mut [u8], sample_size: usize) {
    if cfg!(target_endian = "little") || sample_size < 2 {
        return;
    }
    for sample in buf.chunks_exact_mut(sample_size) {
        sample.reverse();
    }
}
