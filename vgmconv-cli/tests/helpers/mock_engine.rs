//! Scripted decoding engine
//!
//! Inputs are registered per name with a list of tracks (sub-streams). The
//! host file must start with [`MOCK_MAGIC`], read through the stream the
//! driver passes in, so stream plumbing is exercised as well.
//!
//! Sessions render mono PCM16 at 1000 Hz; sample N of the play timeline has
//! value `N % 30000`, which makes seeks visible in the output.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vgmconv_cli::audio::{
    DecodeEngine, DecodeSession, EngineConfig, OpenOptions, RenderStatus, SampleType, StreamFormat,
};
use vgmconv_cli::{Error, Result};
use vgmconv_common::StreamFile;

pub const MOCK_MAGIC: &[u8; 4] = b"MOCK";
pub const MOCK_SAMPLE_RATE: u32 = 1000;

/// One sub-stream of a mock input
#[derive(Debug, Clone, PartialEq)]
pub struct MockTrack {
    pub frames: i64,
    pub loop_points: Option<(i64, i64)>,
    pub title: Option<String>,
    /// Render fails once the position reaches this sample
    pub fail_at: Option<i64>,
}

impl MockTrack {
    pub fn new(frames: i64) -> Self {
        Self {
            frames,
            loop_points: None,
            title: None,
            fail_at: None,
        }
    }

    pub fn looped(mut self, start: i64, end: i64) -> Self {
        self.loop_points = Some((start, end));
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn failing_at(mut self, sample: i64) -> Self {
        self.fail_at = Some(sample);
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockEngine {
    inputs: HashMap<String, Vec<MockTrack>>,
    opens: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
    rendered_blocks: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, tracks: Vec<MockTrack>) -> Self {
        self.inputs.insert(name.to_string(), tracks);
        self
    }

    /// Sessions opened so far (including failed opens)
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Sub-stream counts read without opening a session
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Blocks rendered by every session so far
    pub fn rendered_blocks(&self) -> usize {
        self.rendered_blocks.load(Ordering::SeqCst)
    }

    fn tracks(&self, stream: &dyn StreamFile) -> Result<&Vec<MockTrack>> {
        let mut own = stream.open(stream.name())?;
        let mut magic = [0u8; 4];
        let n = own.read(&mut magic);
        own.close();
        if n != 4 || &magic != MOCK_MAGIC {
            return Err(Error::Format(format!("{}: not a mock stream", stream.name())));
        }

        self.inputs
            .get(stream.name())
            .ok_or_else(|| Error::Format(format!("{}: unknown input", stream.name())))
    }
}

impl DecodeEngine for MockEngine {
    fn open(
        &self,
        stream: &dyn StreamFile,
        config: &EngineConfig,
        options: &OpenOptions,
    ) -> Result<Box<dyn DecodeSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let tracks = self.tracks(stream)?;
        let index = options.subsong_index.max(1);
        let track = tracks
            .get(index as usize - 1)
            .ok_or_else(|| Error::Format(format!("subsong {} out of range", index)))?;

        Ok(Box::new(MockSession::new(
            track,
            config,
            index,
            tracks.len() as u32,
            self.rendered_blocks.clone(),
        )))
    }

    fn count_subsongs(&self, stream: &dyn StreamFile, _options: &OpenOptions) -> Result<u32> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.tracks(stream)?.len() as u32)
    }
}

struct MockSession {
    format: StreamFormat,
    fail_at: Option<i64>,
    position: i64,
    render_frames: usize,
    rendered_blocks: Arc<AtomicUsize>,
}

impl MockSession {
    fn new(
        track: &MockTrack,
        config: &EngineConfig,
        index: u32,
        count: u32,
        rendered_blocks: Arc<AtomicUsize>,
    ) -> Self {
        let (loop_start, loop_end) = track.loop_points.unwrap_or((0, 0));
        let looping = track.loop_points.is_some() && !config.ignore_loop;
        let play_samples = if looping {
            loop_start + ((loop_end - loop_start) as f64 * config.loop_count) as i64
        } else {
            track.frames
        };

        Self {
            format: StreamFormat {
                channels: 1,
                sample_rate: MOCK_SAMPLE_RATE,
                sample_type: SampleType::Pcm16,
                sample_size: 2,
                play_samples,
                loop_start,
                loop_end,
                subsong_count: count,
                subsong_index: index,
                play_forever: looping && config.play_forever && config.allow_play_forever,
                stream_name: track.title.clone(),
            },
            fail_at: track.fail_at,
            position: 0,
            render_frames: config.render_frames,
            rendered_blocks,
        }
    }
}

impl DecodeSession for MockSession {
    fn format(&self) -> &StreamFormat {
        &self.format
    }

    fn render(&mut self, buf: &mut Vec<u8>) -> Result<RenderStatus> {
        buf.clear();
        if let Some(fail_at) = self.fail_at {
            if self.position >= fail_at {
                return Err(Error::Decode(format!("corrupt block at {}", self.position)));
            }
        }

        let frames = if self.format.play_forever {
            self.render_frames
        } else {
            ((self.format.play_samples - self.position).max(0) as usize).min(self.render_frames)
        };
        if frames == 0 {
            return Ok(RenderStatus::Done);
        }

        for i in 0..frames as i64 {
            let value = ((self.position + i) % 30000) as i16;
            buf.extend_from_slice(&value.to_ne_bytes());
        }
        self.position += frames as i64;
        self.rendered_blocks.fetch_add(1, Ordering::SeqCst);
        Ok(RenderStatus::Block { frames })
    }

    fn seek(&mut self, sample: i64) {
        self.position = sample.clamp(0, self.format.play_samples);
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}
