//! Conversion configuration
//!
//! Options resolve in priority order:
//! 1. Command-line flag (highest priority)
//! 2. TOML defaults file (`--config` or `VGMCONV_CONFIG`)
//! 3. Compiled default
//!
//! Parsing is reentrant: [`CliArgs::try_parse_from`] works on any argument
//! vector and keeps no process-wide state.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use vgmconv_common::streamfile::DEFAULT_BUFFER_SIZE;
use vgmconv_common::StreamOptions;

use crate::audio::{EngineConfig, StreamFormat};
use crate::{Error, Result};

/// Smallest accepted render block, in frames
pub const MIN_SAMPLE_BUFFER_SIZE: usize = 128;
/// Largest accepted render block, in frames
pub const MAX_SAMPLE_BUFFER_SIZE: usize = 0x20000;
/// Default render block, in frames
pub const DEFAULT_SAMPLE_BUFFER_SIZE: usize = 0x2000;

/// Command-line arguments for vgmconv
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vgmconv")]
#[command(about = "Decode game audio streams to WAV")]
#[command(version)]
pub struct CliArgs {
    /// Input files
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<String>,

    /// Output file name; `?s` (subsong), `?n` (stream name) and `?f` (input name) make it a template
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// Loop count
    #[arg(short = 'l', value_name = "N")]
    pub loop_count: Option<f64>,

    /// Fade time in seconds after the last loop
    #[arg(short = 'f', value_name = "SECONDS")]
    pub fade_time: Option<f64>,

    /// Fade delay in seconds
    #[arg(short = 'd', value_name = "SECONDS")]
    pub fade_delay: Option<f64>,

    /// Ignore fade and play the rest of the stream after the last loop
    #[arg(short = 'F')]
    pub ignore_fade: bool,

    /// Ignore looping
    #[arg(short = 'i')]
    pub ignore_loop: bool,

    /// Force end-to-end looping when the stream has no loop
    #[arg(short = 'e')]
    pub force_loop: bool,

    /// Force end-to-end looping even when the stream has a loop
    #[arg(short = 'E')]
    pub really_force_loop: bool,

    /// Write to stdout instead of a file
    #[arg(short = 'p')]
    pub to_stdout: bool,

    /// Write to stdout even when it is a terminal
    #[arg(short = 'P')]
    pub stdout_even_if_terminal: bool,

    /// Loop forever (requires -p)
    #[arg(short = 'c')]
    pub play_forever: bool,

    /// Subsong to decode (first is 1)
    #[arg(short = 's', value_name = "N")]
    pub subsong_index: Option<u32>,

    /// Decode subsongs up to N (0 = all)
    #[arg(short = 'S', value_name = "N")]
    pub subsong_end: Option<u32>,

    /// Write loop markers into a smpl chunk
    #[arg(short = 'L')]
    pub write_loop_markers: bool,

    /// Keep the original sample format (PCM16, PCM24 or float)
    #[arg(short = 'w')]
    pub original_format: bool,

    /// Write float samples
    #[arg(short = 'W')]
    pub float_format: bool,

    /// Print metadata only, don't decode
    #[arg(short = 'm')]
    pub metadata_only: bool,

    /// Decode without writing samples
    #[arg(short = 'O')]
    pub decode_only: bool,

    /// Decode twice, the second time after a reset, to <name>.reset.wav
    #[arg(short = 'r')]
    pub test_reset: bool,

    /// Seek to sample before decoding (-2 = loop start, -3 = loop end)
    #[arg(short = 'k', value_name = "N", allow_negative_numbers = true)]
    pub seek_first: Option<i64>,

    /// Second seek, not range-checked (-2 = loop start, -3 = loop end)
    #[arg(short = 'K', value_name = "N", allow_negative_numbers = true)]
    pub seek_second: Option<i64>,

    /// Keep at most N channels
    #[arg(short = 'D', value_name = "N")]
    pub downmix_channels: Option<u32>,

    /// Frames per decode block
    #[arg(short = 'B', value_name = "N")]
    pub sample_buffer_size: Option<usize>,

    /// Only output the Nth stereo pair (first is 0)
    #[arg(short = '2', long, value_name = "N")]
    pub stereo_track: Option<u32>,

    /// TOML file with default settings
    #[arg(long, value_name = "FILE", env = "VGMCONV_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Defaults read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDefaults {
    pub loop_count: Option<f64>,
    pub fade_time: Option<f64>,
    pub fade_delay: Option<f64>,
    pub sample_buffer_size: Option<usize>,
    pub stream_buffer_size: Option<usize>,
    pub archive_scheme: Option<String>,
}

impl FileDefaults {
    /// Load defaults from `path`.
    ///
    /// # Errors
    /// - `Config` if the file can't be read or isn't valid TOML
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Last sub-stream of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsongEnd {
    /// No range requested
    #[default]
    Unset,
    /// Up to and including this sub-stream
    Last(u32),
    /// Up to the last sub-stream, discovered by opening the input
    All,
}

/// Seek request, resolved against the opened stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Sample(i64),
    LoopStart,
    LoopEnd,
}

impl SeekTarget {
    /// Map a command-line value: -1 is none, -2 loop start, -3 loop end.
    pub fn from_arg(value: i64) -> Option<Self> {
        match value {
            -1 => None,
            -2 => Some(SeekTarget::LoopStart),
            -3 => Some(SeekTarget::LoopEnd),
            n => Some(SeekTarget::Sample(n)),
        }
    }

    pub fn resolve(self, format: &StreamFormat) -> i64 {
        match self {
            SeekTarget::Sample(n) => n,
            SeekTarget::LoopStart => format.loop_start,
            SeekTarget::LoopEnd => format.loop_end,
        }
    }
}

/// Sample format of written output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSampleFormat {
    #[default]
    Pcm16,
    /// Whatever width the stream decodes to
    Original,
    Float,
}

/// Every conversion option, resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub inputs: Vec<String>,
    pub output_name: Option<String>,
    pub output_template: Option<String>,
    pub loop_count: f64,
    pub fade_time: f64,
    pub fade_delay: f64,
    pub ignore_fade: bool,
    pub ignore_loop: bool,
    pub force_loop: bool,
    pub really_force_loop: bool,
    pub to_stdout: bool,
    pub stdout_even_if_terminal: bool,
    pub play_forever: bool,
    /// 0 lets the engine pick its default sub-stream
    pub subsong_index: u32,
    pub subsong_end: SubsongEnd,
    pub write_loop_markers: bool,
    pub sample_format: OutputSampleFormat,
    pub print_metadata_only: bool,
    pub decode_only: bool,
    pub test_reset: bool,
    pub seek_first: Option<SeekTarget>,
    pub seek_second: Option<SeekTarget>,
    /// 0 = off
    pub downmix_channels: u32,
    /// Frames per decode block
    pub sample_buffer_size: usize,
    pub stereo_track: Option<u32>,
    /// Read-ahead window of input streams, in bytes
    pub stream_buffer_size: usize,
    pub archive_scheme: Option<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_name: None,
            output_template: None,
            loop_count: 2.0,
            fade_time: 10.0,
            fade_delay: 0.0,
            ignore_fade: false,
            ignore_loop: false,
            force_loop: false,
            really_force_loop: false,
            to_stdout: false,
            stdout_even_if_terminal: false,
            play_forever: false,
            subsong_index: 0,
            subsong_end: SubsongEnd::Unset,
            write_loop_markers: false,
            sample_format: OutputSampleFormat::Pcm16,
            print_metadata_only: false,
            decode_only: false,
            test_reset: false,
            seek_first: None,
            seek_second: None,
            downmix_channels: 0,
            sample_buffer_size: DEFAULT_SAMPLE_BUFFER_SIZE,
            stereo_track: None,
            stream_buffer_size: DEFAULT_BUFFER_SIZE,
            archive_scheme: None,
        }
    }
}

impl ConvertConfig {
    /// Resolve parsed arguments, loading the TOML defaults file if one is named.
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let defaults = match &args.config {
            Some(path) => FileDefaults::load(path)?,
            None => FileDefaults::default(),
        };
        Ok(Self::resolve(args, &defaults))
    }

    /// Merge arguments over file defaults over compiled defaults.
    pub fn resolve(args: CliArgs, defaults: &FileDefaults) -> Self {
        let base = Self::default();

        let (output_name, output_template) = match args.output {
            Some(name) if name.contains('?') => (None, Some(name)),
            Some(name) => (Some(name), None),
            None => (None, None),
        };

        let subsong_end = match args.subsong_end {
            None => SubsongEnd::Unset,
            Some(0) => SubsongEnd::All,
            Some(n) => SubsongEnd::Last(n),
        };
        let mut subsong_index = args.subsong_index.unwrap_or(0);
        if subsong_end != SubsongEnd::Unset && subsong_index == 0 {
            subsong_index = 1;
        }

        let sample_format = if args.float_format {
            OutputSampleFormat::Float
        } else if args.original_format {
            OutputSampleFormat::Original
        } else {
            OutputSampleFormat::Pcm16
        };

        Self {
            inputs: args.inputs,
            output_name,
            output_template,
            loop_count: args.loop_count.or(defaults.loop_count).unwrap_or(base.loop_count),
            fade_time: args.fade_time.or(defaults.fade_time).unwrap_or(base.fade_time),
            fade_delay: args.fade_delay.or(defaults.fade_delay).unwrap_or(base.fade_delay),
            ignore_fade: args.ignore_fade,
            ignore_loop: args.ignore_loop,
            force_loop: args.force_loop,
            really_force_loop: args.really_force_loop,
            to_stdout: args.to_stdout || args.stdout_even_if_terminal,
            stdout_even_if_terminal: args.stdout_even_if_terminal,
            play_forever: args.play_forever,
            subsong_index,
            subsong_end,
            write_loop_markers: args.write_loop_markers,
            sample_format,
            print_metadata_only: args.metadata_only,
            decode_only: args.decode_only,
            test_reset: args.test_reset,
            seek_first: args.seek_first.and_then(SeekTarget::from_arg),
            seek_second: args.seek_second.and_then(SeekTarget::from_arg),
            downmix_channels: args.downmix_channels.unwrap_or(base.downmix_channels),
            sample_buffer_size: args
                .sample_buffer_size
                .or(defaults.sample_buffer_size)
                .unwrap_or(base.sample_buffer_size),
            stereo_track: args.stereo_track,
            stream_buffer_size: defaults.stream_buffer_size.unwrap_or(base.stream_buffer_size),
            archive_scheme: defaults.archive_scheme.clone(),
        }
    }

    /// Reject option combinations that make the whole invocation invalid.
    ///
    /// # Errors
    /// - `Config` on out-of-range buffer sizes or conflicting output options
    pub fn validate(&self, stdout_is_terminal: bool) -> Result<()> {
        if !(MIN_SAMPLE_BUFFER_SIZE..=MAX_SAMPLE_BUFFER_SIZE).contains(&self.sample_buffer_size) {
            return Err(Error::Config(format!(
                "Sample buffer size {} outside {}..={}",
                self.sample_buffer_size, MIN_SAMPLE_BUFFER_SIZE, MAX_SAMPLE_BUFFER_SIZE
            )));
        }
        if self.stream_buffer_size == 0 {
            return Err(Error::Config("Stream buffer size must be positive".to_string()));
        }
        if self.to_stdout && stdout_is_terminal && !self.stdout_even_if_terminal {
            return Err(Error::Config(
                "Refusing to write audio to a terminal (use -P to force)".to_string(),
            ));
        }
        if self.play_forever && !self.to_stdout {
            return Err(Error::Config("-c requires -p or -P".to_string()));
        }
        if self.to_stdout && self.output_name.is_some() {
            return Err(Error::Config("-p and -o can't be used together".to_string()));
        }
        Ok(())
    }

    /// Playback parameters handed to the engine.
    ///
    /// Loop markers are written instead of looping, so `-L` also ignores loops.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            loop_count: self.loop_count,
            fade_time: self.fade_time,
            fade_delay: self.fade_delay,
            ignore_loop: self.ignore_loop || self.write_loop_markers,
            force_loop: self.force_loop,
            really_force_loop: self.really_force_loop,
            ignore_fade: self.ignore_fade,
            play_forever: self.play_forever,
            allow_play_forever: self.play_forever,
            disable_config_override: self.write_loop_markers,
            downmix_channels: self.downmix_channels,
            force_pcm16: self.sample_format == OutputSampleFormat::Pcm16,
            force_float: self.sample_format == OutputSampleFormat::Float,
            render_frames: self.sample_buffer_size,
        }
    }

    /// Options for the input stream factory
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            buffer_size: self.stream_buffer_size,
            archive_scheme: self.archive_scheme.clone(),
            ..StreamOptions::default()
        }
    }
}
