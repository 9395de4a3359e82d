//! Decoding engine using symphonia
//!
//! Decodes the formats symphonia supports (WAV, FLAC, MP3, AAC, Vorbis, ...)
//! and renders them with looping and fading applied.
//!
//! Each audio track of the container is one sub-stream. The selected track is
//! decoded completely to interleaved f32 when the session opens; rendering
//! then walks a play timeline over that buffer. Because the buffer never
//! changes, seeks are sample-accurate and a reset replays byte-identical
//! output.
//!
//! Loop points come from `LOOPSTART` plus `LOOPEND` or `LOOPLENGTH` tags (the
//! usual convention for looping game audio in Vorbis/FLAC comments).

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::{Hint, ProbeResult};
use tracing::{debug, warn};
use vgmconv_common::StreamFile;

use super::engine::{
    DecodeEngine, DecodeSession, EngineConfig, OpenOptions, RenderStatus, SampleType, StreamFormat,
};
use super::source::StreamFileSource;
use crate::{Error, Result};

/// Decoding engine backed by symphonia's default format and codec registries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaEngine;

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DecodeEngine for SymphoniaEngine {
    fn open(
        &self,
        stream: &dyn StreamFile,
        config: &EngineConfig,
        options: &OpenOptions,
    ) -> Result<Box<dyn DecodeSession>> {
        let name = stream.name().to_string();
        debug!("Opening {} (subsong {})", name, options.subsong_index);

        let mut probed = probe(stream)?;
        let tracks = audio_tracks(probed.format.as_ref(), &name)?;

        let subsong_count = tracks.len() as u32;
        let subsong_index = options.subsong_index.max(1);
        if subsong_index > subsong_count {
            return Err(Error::Format(format!(
                "Subsong {} out of range (file has {})",
                subsong_index, subsong_count
            )));
        }
        let (track_id, params) = &tracks[subsong_index as usize - 1];

        let mut tags = StreamTags::default();
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                tags.absorb(revision.tags());
            }
        }
        if let Some(revision) = probed.format.metadata().current() {
            tags.absorb(revision.tags());
        }

        let decoded = decode_track(probed.format.as_mut(), *track_id, params)?;
        let decoded = select_channels(decoded, config, options)?;

        let session = SymphoniaSession::new(decoded, tags, config, subsong_index, subsong_count);
        debug!(
            "Opened {}: {} Hz, {} channels, {} play samples",
            name, session.format.sample_rate, session.format.channels, session.format.play_samples
        );
        Ok(Box::new(session))
    }

    fn count_subsongs(&self, stream: &dyn StreamFile, _options: &OpenOptions) -> Result<u32> {
        let probed = probe(stream)?;
        let count = audio_tracks(probed.format.as_ref(), stream.name())?.len() as u32;
        debug!("Probed {}: {} audio track(s)", stream.name(), count);
        Ok(count)
    }
}

/// Probe the container format of `stream` without decoding any packet.
fn probe(stream: &dyn StreamFile) -> Result<ProbeResult> {
    let name = stream.name();

    // the engine keeps its own view of the file; same name shares the handle
    let own = stream.open(name)?;
    let mss = MediaSourceStream::new(Box::new(StreamFileSource::new(own)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_of(name) {
        hint.with_extension(extension);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Format(format!("Failed to probe format of {}: {}", name, e)))
}

/// Decodable tracks of a probed container, one per sub-stream.
fn audio_tracks(format: &dyn FormatReader, name: &str) -> Result<Vec<(u32, CodecParameters)>> {
    let tracks: Vec<(u32, CodecParameters)> = format
        .tracks()
        .iter()
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .collect();

    if tracks.is_empty() {
        return Err(Error::Format(format!("No audio track found in {}", name)));
    }
    Ok(tracks)
}

fn extension_of(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Source sample width, used when the original format is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceWidth {
    Bits16,
    Bits24,
    Wide,
}

impl SourceWidth {
    fn of(buffer: &AudioBufferRef) -> Self {
        match buffer {
            AudioBufferRef::U8(_)
            | AudioBufferRef::S8(_)
            | AudioBufferRef::U16(_)
            | AudioBufferRef::S16(_) => SourceWidth::Bits16,
            AudioBufferRef::U24(_) | AudioBufferRef::S24(_) => SourceWidth::Bits24,
            AudioBufferRef::U32(_)
            | AudioBufferRef::S32(_)
            | AudioBufferRef::F32(_)
            | AudioBufferRef::F64(_) => SourceWidth::Wide,
        }
    }

    fn sample_type(self) -> SampleType {
        match self {
            SourceWidth::Bits16 => SampleType::Pcm16,
            SourceWidth::Bits24 => SampleType::Pcm24,
            SourceWidth::Wide => SampleType::Float,
        }
    }
}

/// Fully decoded track
struct DecodedTrack {
    /// Interleaved samples in [-1.0, 1.0]
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
    width: SourceWidth,
}

impl DecodedTrack {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decode every packet of `track_id` to interleaved f32.
fn decode_track(
    format: &mut dyn FormatReader,
    track_id: u32,
    params: &CodecParameters,
) -> Result<DecodedTrack> {
    let mut decoder = symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| Error::Format(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_rate = params.sample_rate.unwrap_or(0);
    let mut channels = params.channels.map(|c| c.count()).unwrap_or(0);
    let mut width = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Reached end of stream");
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!("Track list changed mid-stream, stopping decode");
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if width.is_none() {
                    width = Some(SourceWidth::of(&decoded));
                }
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Decode error: {}", e);
                continue;
            }
            Err(e) => {
                warn!("Decoder failure: {}", e);
                continue;
            }
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(Error::Format("Sample rate or channel count not found".to_string()));
    }

    Ok(DecodedTrack {
        samples,
        sample_rate,
        channels,
        width: width.unwrap_or(SourceWidth::Bits16),
    })
}

/// Apply the stereo-track filter and channel downmix.
fn select_channels(
    track: DecodedTrack,
    config: &EngineConfig,
    options: &OpenOptions,
) -> Result<DecodedTrack> {
    let mut keep: Vec<usize> = (0..track.channels).collect();

    if let Some(pair) = options.stereo_track {
        let first = pair as usize * 2;
        if first + 2 > track.channels {
            return Err(Error::Format(format!(
                "Stereo track {} out of range ({} channels)",
                pair, track.channels
            )));
        }
        keep = vec![first, first + 1];
    }

    let max_channels = config.downmix_channels as usize;
    if max_channels > 0 && keep.len() > max_channels {
        keep.truncate(max_channels);
    }

    if keep.len() == track.channels {
        return Ok(track);
    }

    let frames = track.frames();
    let mut samples = Vec::with_capacity(frames * keep.len());
    for frame in track.samples.chunks_exact(track.channels) {
        samples.extend(keep.iter().map(|&ch| frame[ch]));
    }

    Ok(DecodedTrack {
        samples,
        channels: keep.len(),
        ..track
    })
}

/// Loop points and title read from stream tags
#[derive(Debug, Default)]
struct StreamTags {
    title: Option<String>,
    loop_start: Option<i64>,
    loop_end: Option<i64>,
    loop_length: Option<i64>,
}

impl StreamTags {
    fn absorb(&mut self, tags: &[Tag]) {
        for tag in tags {
            let value = tag.value.to_string();
            if tag.std_key == Some(StandardTagKey::TrackTitle) {
                let title = value.trim();
                if !title.is_empty() {
                    self.title = Some(title.to_string());
                }
                continue;
            }

            let number = value.trim().parse::<i64>().ok();
            if tag.key.eq_ignore_ascii_case("LOOPSTART") {
                self.loop_start = number.or(self.loop_start);
            } else if tag.key.eq_ignore_ascii_case("LOOPEND") {
                self.loop_end = number.or(self.loop_end);
            } else if tag.key.eq_ignore_ascii_case("LOOPLENGTH") {
                self.loop_length = number.or(self.loop_length);
            }
        }
    }

    /// Loop region, when the tags describe a valid one within `total` samples
    fn loop_points(&self, total: i64) -> Option<(i64, i64)> {
        let start = self.loop_start?;
        let end = match (self.loop_end, self.loop_length) {
            (Some(end), _) => end,
            (None, Some(length)) => start + length,
            (None, None) => return None,
        };
        (start >= 0 && start < end && end <= total).then_some((start, end))
    }
}

/// Play timeline: maps output positions to source samples and fade volume.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Timeline {
    total: i64,
    looping: bool,
    loop_start: i64,
    loop_end: i64,
    /// Position where the requested number of loops has been played
    loops_end: i64,
    fade_start: i64,
    fade_length: i64,
    ignore_fade: bool,
    forever: bool,
    play_samples: i64,
}

impl Timeline {
    fn new(total: i64, loop_points: Option<(i64, i64)>, config: &EngineConfig, sample_rate: u32) -> Self {
        let has_loop = loop_points.is_some();
        let (mut loop_start, mut loop_end) = loop_points.unwrap_or((0, 0));

        let mut looping = has_loop;
        if config.really_force_loop || (config.force_loop && !has_loop) {
            loop_start = 0;
            loop_end = total;
            looping = total > 0;
        }
        if config.ignore_loop {
            looping = false;
        }

        let forever = looping && config.play_forever && config.allow_play_forever;
        let body = loop_end - loop_start;
        let loops_end = loop_start + (body as f64 * config.loop_count.max(0.0)).floor() as i64;
        let rate = sample_rate as f64;
        let fade_delay = (config.fade_delay.max(0.0) * rate).round() as i64;
        let fade_length = (config.fade_time.max(0.0) * rate).round() as i64;

        let play_samples = if !looping {
            total
        } else if config.ignore_fade {
            loops_end + (total - loop_end)
        } else {
            loops_end + fade_delay + fade_length
        };

        Self {
            total,
            looping,
            loop_start,
            loop_end,
            loops_end,
            fade_start: loops_end + fade_delay,
            fade_length,
            ignore_fade: config.ignore_fade,
            forever,
            play_samples,
        }
    }

    /// Source sample for play position `pos`
    fn source_sample(&self, pos: i64) -> i64 {
        if !self.looping {
            return pos;
        }
        // loops_end can fall before loop_end when fewer than one loop is played
        if self.ignore_fade && !self.forever && pos >= self.loops_end {
            return self.loop_end + (pos - self.loops_end);
        }
        if pos < self.loop_end {
            return pos;
        }
        self.loop_start + (pos - self.loop_start) % (self.loop_end - self.loop_start)
    }

    /// Volume at play position `pos`
    fn volume(&self, pos: i64) -> f32 {
        if !self.looping || self.forever || self.ignore_fade || pos < self.fade_start {
            return 1.0;
        }
        if self.fade_length <= 0 {
            return 0.0;
        }
        let into = (pos - self.fade_start) as f64 / self.fade_length as f64;
        (1.0 - into).clamp(0.0, 1.0) as f32
    }
}

struct SymphoniaSession {
    format: StreamFormat,
    samples: Vec<f32>,
    channels: usize,
    timeline: Timeline,
    position: i64,
    render_frames: usize,
}

impl SymphoniaSession {
    fn new(
        track: DecodedTrack,
        tags: StreamTags,
        config: &EngineConfig,
        subsong_index: u32,
        subsong_count: u32,
    ) -> Self {
        let total = track.frames() as i64;
        let timeline = Timeline::new(total, tags.loop_points(total), config, track.sample_rate);

        let sample_type = if config.force_float {
            SampleType::Float
        } else if config.force_pcm16 {
            SampleType::Pcm16
        } else {
            track.width.sample_type()
        };

        let format = StreamFormat {
            channels: track.channels as u16,
            sample_rate: track.sample_rate,
            sample_type,
            sample_size: sample_type.sample_size(),
            play_samples: timeline.play_samples,
            loop_start: timeline.loop_start,
            loop_end: timeline.loop_end,
            subsong_count,
            subsong_index,
            play_forever: timeline.forever,
            stream_name: tags.title,
        };

        Self {
            format,
            samples: track.samples,
            channels: track.channels,
            timeline,
            position: 0,
            render_frames: config.render_frames.max(1),
        }
    }

    fn push_sample(&self, value: f32, buf: &mut Vec<u8>) {
        match self.format.sample_type {
            SampleType::Pcm16 => {
                let v = (value * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                buf.extend_from_slice(&v.to_ne_bytes());
            }
            SampleType::Pcm24 => {
                let v = (value * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32;
                let bytes = v.to_ne_bytes();
                if cfg!(target_endian = "little") {
                    buf.extend_from_slice(&bytes[..3]);
                } else {
                    buf.extend_from_slice(&bytes[1..]);
                }
            }
            SampleType::Float => buf.extend_from_slice(&value.to_ne_bytes()),
        }
    }
}

impl DecodeSession for SymphoniaSession {
    fn format(&self) -> &StreamFormat {
        &self.format
    }

    fn render(&mut self, buf: &mut Vec<u8>) -> Result<RenderStatus> {
        buf.clear();

        let frames = if self.timeline.forever {
            self.render_frames
        } else {
            let left = (self.timeline.play_samples - self.position).max(0) as usize;
            left.min(self.render_frames)
        };
        if frames == 0 || self.timeline.total == 0 {
            return Ok(RenderStatus::Done);
        }

        buf.reserve(frames * self.format.frame_size());
        for i in 0..frames as i64 {
            let pos = self.position + i;
            let src = self.timeline.source_sample(pos);
            let volume = self.timeline.volume(pos);
            let start = src as usize * self.channels;

            for ch in 0..self.channels {
                let value = self.samples.get(start + ch).copied().unwrap_or(0.0);
                self.push_sample(value * volume, buf);
            }
        }
        self.position += frames as i64;

        Ok(RenderStatus::Block { frames })
    }

    fn seek(&mut self, sample: i64) {
        self.position = if self.timeline.forever {
            sample.max(0)
        } else {
            sample.clamp(0, self.timeline.play_samples.max(0))
        };
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}
