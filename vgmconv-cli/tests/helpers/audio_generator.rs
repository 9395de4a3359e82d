//! WAV input generation
//!
//! Deterministic ramps written with hound, so decoded samples can be compared
//! one by one.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Value of `channel` in `frame` for the 16-bit ramp
pub fn ramp_sample(frame: usize, channel: usize) -> i16 {
    (((frame * 37 + channel * 1000) % 20000) as i32 - 10000) as i16
}

/// Write a 16-bit ramp with `channels` channels and `frames` frames
pub fn generate_ramp_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    frames: usize,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for frame in 0..frames {
        for channel in 0..channels as usize {
            writer.write_sample(ramp_sample(frame, channel))?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Write a mono 24-bit ramp
pub fn generate_pcm24_wav<P: AsRef<Path>>(path: P, frames: usize) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for frame in 0..frames {
        writer.write_sample(ramp_sample(frame, 0) as i32 * 256)?;
    }
    writer.finalize()?;
    Ok(())
}
