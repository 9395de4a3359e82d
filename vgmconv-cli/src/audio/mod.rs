//! Audio decoding and WAV output

pub mod decoder;
pub mod engine;
pub mod source;
pub mod wav;

pub use decoder::SymphoniaEngine;
pub use engine::{
    DecodeEngine, DecodeSession, EngineConfig, OpenOptions, RenderStatus, SampleType, StreamFormat,
};
pub use source::StreamFileSource;
pub use wav::{swap_samples_le, WavHeader, WAV_HEADER_SIZE, WAV_HEADER_SIZE_SMPL};
