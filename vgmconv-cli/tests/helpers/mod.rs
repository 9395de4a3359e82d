//! Test helper modules for vgmconv integration tests
//!
//! - MockEngine: scripted decoding engine with observable opens
//! - MemorySink: captures output files, stdout and info text
//! - audio_generator: hound-written WAV inputs

#![allow(dead_code)]

pub mod audio_generator;
pub mod memory_sink;
pub mod mock_engine;

#[allow(unused_imports)]
pub use memory_sink::MemorySink;
#[allow(unused_imports)]
pub use mock_engine::{MockEngine, MockTrack, MOCK_MAGIC};

use vgmconv_cli::config::{CliArgs, ConvertConfig, FileDefaults};

/// Build a config the way the binary does, from an argument vector
pub fn config_from(args: &[&str]) -> ConvertConfig {
    let mut argv = vec!["vgmconv"];
    argv.extend_from_slice(args);
    let args = <CliArgs as clap::Parser>::try_parse_from(argv).unwrap();
    ConvertConfig::resolve(args, &FileDefaults::default())
}

/// Parse a WAV produced by the converter into (header fields, data bytes)
pub fn split_wav(bytes: &[u8]) -> (WavInfo, &[u8]) {
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");

    let mut info = WavInfo::default();
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32_at(bytes, pos + 4) as usize;
        let body = pos + 8;
        match id {
            b"fmt " => {
                info.format_tag = u16_at(bytes, body);
                info.channels = u16_at(bytes, body + 2);
                info.sample_rate = u32_at(bytes, body + 4);
                info.bits_per_sample = u16_at(bytes, body + 14);
            }
            b"smpl" => {
                info.loop_start = Some(u32_at(bytes, body + 44));
                info.loop_end = Some(u32_at(bytes, body + 48));
            }
            b"data" => {
                info.data_size = size;
                return (info, &bytes[body..]);
            }
            _ => {}
        }
        pos = body + size;
    }
    panic!("no data chunk");
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WavInfo {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub loop_start: Option<u32>,
    pub loop_end: Option<u32>,
    pub data_size: usize,
}

fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

/// Little-endian i16 samples of a data body
pub fn pcm16_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}
