//! Decoding engine contract
//!
//! The conversion driver only sees the engine through these traits: open a
//! sub-stream from a buffered stream, read its format, render blocks, seek,
//! reset. Dropping a session frees it.

use vgmconv_common::StreamFile;

use crate::Result;

/// Sample encoding of rendered blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Signed 16-bit PCM
    Pcm16,
    /// Signed 24-bit PCM, packed in 3 bytes
    Pcm24,
    /// 32-bit IEEE float
    Float,
}

impl SampleType {
    /// Bytes per sample
    pub fn sample_size(self) -> usize {
        match self {
            SampleType::Pcm16 => 2,
            SampleType::Pcm24 => 3,
            SampleType::Float => 4,
        }
    }

    /// Whether samples are floating point
    pub fn is_float(self) -> bool {
        matches!(self, SampleType::Float)
    }
}

/// Read-only format of an opened session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_type: SampleType,
    /// Bytes per sample (one channel)
    pub sample_size: usize,
    /// Samples per channel the session will render with the applied config
    pub play_samples: i64,
    /// Loop start in samples (equal to `loop_end` when the stream has no loop)
    pub loop_start: i64,
    /// Loop end in samples
    pub loop_end: i64,
    /// Number of sub-streams in the input
    pub subsong_count: u32,
    /// Sub-stream this session decodes (1-based)
    pub subsong_index: u32,
    /// Whether the session renders indefinitely
    pub play_forever: bool,
    /// Stream title, when the input carries one
    pub stream_name: Option<String>,
}

impl StreamFormat {
    /// Whether the stream carries usable loop points
    pub fn has_loop(&self) -> bool {
        self.loop_start < self.loop_end
    }

    /// Bytes in one frame (all channels)
    pub fn frame_size(&self) -> usize {
        self.sample_size * self.channels as usize
    }
}

/// Playback parameters applied to a session before it is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub loop_count: f64,
    /// Fade-out length in seconds after the last loop
    pub fade_time: f64,
    /// Seconds of full-volume playback before the fade starts
    pub fade_delay: f64,
    pub ignore_loop: bool,
    /// Loop end-to-end when the stream has no loop points
    pub force_loop: bool,
    /// Loop end-to-end even when the stream has loop points
    pub really_force_loop: bool,
    /// Skip the fade and play the rest of the stream after the last loop
    pub ignore_fade: bool,
    pub play_forever: bool,
    pub allow_play_forever: bool,
    /// Ignore per-file config embedded in the input
    pub disable_config_override: bool,
    /// Keep at most this many channels (0 = off)
    pub downmix_channels: u32,
    pub force_pcm16: bool,
    pub force_float: bool,
    /// Frames per rendered block
    pub render_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_count: 2.0,
            fade_time: 10.0,
            fade_delay: 0.0,
            ignore_loop: false,
            force_loop: false,
            really_force_loop: false,
            ignore_fade: false,
            play_forever: false,
            allow_play_forever: false,
            disable_config_override: false,
            downmix_channels: 0,
            force_pcm16: true,
            force_float: false,
            render_frames: 8192,
        }
    }
}

/// Sub-stream selection for [`DecodeEngine::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// 1-based sub-stream index, 0 for the engine default
    pub subsong_index: u32,
    /// Keep only this stereo pair (0-based)
    pub stereo_track: Option<u32>,
}

/// Result of one [`DecodeSession::render`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// `frames` frames of native-endian samples were written to the buffer
    Block { frames: usize },
    /// Nothing left to render
    Done,
}

/// Opens decode sessions.
pub trait DecodeEngine {
    /// Open sub-stream `options.subsong_index` of `stream`.
    ///
    /// The engine may open its own streams through `stream.open(..)`; the
    /// caller closes `stream` after this returns.
    ///
    /// # Errors
    /// - `Format` if the input is not recognized or the sub-stream is out of range
    fn open(
        &self,
        stream: &dyn StreamFile,
        config: &EngineConfig,
        options: &OpenOptions,
    ) -> Result<Box<dyn DecodeSession>>;

    /// Number of sub-streams in `stream`, without preparing a session.
    ///
    /// Engines that can read the count from the container header should
    /// override this; the default opens a full session.
    fn count_subsongs(&self, stream: &dyn StreamFile, options: &OpenOptions) -> Result<u32> {
        let session = self.open(stream, &EngineConfig::default(), options)?;
        Ok(session.format().subsong_count)
    }
}

/// One opened sub-stream.
pub trait DecodeSession {
    /// Format of the opened sub-stream
    fn format(&self) -> &StreamFormat;

    /// Render the next block into `buf` (cleared first), native byte order.
    fn render(&mut self, buf: &mut Vec<u8>) -> Result<RenderStatus>;

    /// Position rendering at `sample`
    fn seek(&mut self, sample: i64);

    /// Return to the initial position without reopening the input
    fn reset(&mut self);
}
