//! Conversion driver
//!
//! For each input (and each requested sub-stream): open a buffered stream,
//! open a decode session on it, validate the play configuration, name the
//! output, then write a WAV header followed by little-endian sample blocks.
//! Per-item failures are logged and counted; the batch always continues.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use vgmconv_common::{HostFileSystem, StreamFactory};

use super::naming::{default_template, expand_template, reset_name, NameFields};
use crate::audio::{
    swap_samples_le, DecodeEngine, DecodeSession, EngineConfig, OpenOptions, RenderStatus,
    StreamFormat, WavHeader,
};
use crate::config::{ConvertConfig, SubsongEnd};
use crate::{Error, Result};

/// Where converted audio and stream descriptions go.
pub trait OutputSink {
    /// Create (or truncate) the output file `name`
    fn create_file(&mut self, name: &str) -> io::Result<Box<dyn Write>>;

    /// Raw output to standard output
    fn stdout(&mut self) -> Box<dyn Write>;

    /// Print a stream description for the user
    fn print_info(&mut self, text: &str);
}

/// Writes files to the real filesystem and info to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSink;

impl OutputSink for FileSink {
    fn create_file(&mut self, name: &str) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(BufWriter::new(File::create(name)?)))
    }

    fn stdout(&mut self) -> Box<dyn Write> {
        Box::new(io::stdout())
    }

    fn print_info(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Outcome of a run over all inputs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// (input, sub-stream) pairs fully converted, or described in metadata-only mode
    pub converted: usize,
    pub failed: usize,
}

impl RunSummary {
    /// A run succeeds if anything converted
    pub fn is_success(&self) -> bool {
        self.converted > 0
    }
}

/// Converts inputs to WAV through a decoding engine.
pub struct Converter<E, S> {
    config: ConvertConfig,
    engine_config: EngineConfig,
    factory: StreamFactory,
    engine: E,
    sink: S,
}

impl<E: DecodeEngine, S: OutputSink> Converter<E, S> {
    /// Create a converter reading inputs from `fs`.
    ///
    /// `config` should already be validated.
    pub fn new(config: ConvertConfig, fs: Arc<dyn HostFileSystem>, engine: E, sink: S) -> Self {
        let factory = StreamFactory::with_options(fs, config.stream_options());
        let engine_config = config.engine_config();
        Self {
            config,
            engine_config,
            factory,
            engine,
            sink,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Convert every input.
    pub fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        let inputs = self.config.inputs.clone();

        for input in &inputs {
            if self.config.subsong_index > 0 && self.config.subsong_end != SubsongEnd::Unset {
                self.convert_subsongs(input, &mut summary);
            } else {
                self.convert_one(input, self.config.subsong_index, &mut summary);
            }
        }

        info!(
            "Converted {} item(s), {} failed",
            summary.converted, summary.failed
        );
        summary
    }

    /// Convert the configured sub-stream range of `input`.
    fn convert_subsongs(&mut self, input: &str, summary: &mut RunSummary) {
        let start = self.config.subsong_index;
        let end = match self.config.subsong_end {
            SubsongEnd::Last(end) => end,
            SubsongEnd::Unset => start,
            SubsongEnd::All => match self.discover_subsongs(input) {
                Ok(count) => count,
                Err(e) => {
                    error!("{}: {}", input, e);
                    summary.failed += 1;
                    return;
                }
            },
        };
        debug!("{}: converting subsongs {} to {}", input, start, end);

        let failed_before = summary.failed;
        for index in start..=end {
            self.convert_one(input, index, summary);
        }

        let failures = summary.failed - failed_before;
        if failures > 0 {
            warn!("{}: failed {} subsong(s)", input, failures);
        }
    }

    /// Probe `input` once to read how many sub-streams it has.
    fn discover_subsongs(&self, input: &str) -> Result<u32> {
        let mut stream = self.factory.open(input)?;
        let options = self.open_options(self.config.subsong_index);
        let count = self.engine.count_subsongs(stream.as_ref(), &options);
        stream.close();

        let count = count?;
        debug!("{}: found {} subsong(s)", input, count);
        Ok(count)
    }

    fn open_options(&self, subsong_index: u32) -> OpenOptions {
        OpenOptions {
            subsong_index,
            stereo_track: self.config.stereo_track,
        }
    }

    fn convert_one(&mut self, input: &str, subsong_index: u32, summary: &mut RunSummary) {
        match self.convert_file(input, subsong_index) {
            Ok(()) => summary.converted += 1,
            Err(e) => {
                error!("{} (subsong {}): {}", input, subsong_index.max(1), e);
                summary.failed += 1;
            }
        }
    }

    /// Open a stream for `input` and a decode session on it.
    fn open_session(&self, input: &str, subsong_index: u32) -> Result<Box<dyn DecodeSession>> {
        let mut stream = self.factory.open(input)?;
        let options = self.open_options(subsong_index);

        let session = self.engine.open(stream.as_ref(), &self.engine_config, &options);
        stream.close();
        session
    }

    /// Convert one sub-stream of `input`.
    ///
    /// # Errors
    /// - `Stream`/`Format` if the input can't be opened
    /// - `Validation` on a bad play configuration or output name
    /// - `Io`/`Decode` if writing fails
    pub fn convert_file(&mut self, input: &str, subsong_index: u32) -> Result<()> {
        let mut session = self.open_session(input, subsong_index)?;
        let format = session.format().clone();

        let play_samples = format.play_samples;
        if play_samples <= 0 {
            return Err(Error::Validation(format!(
                "Wrong time config ({} play samples)",
                play_samples
            )));
        }

        let seek_first = self.config.seek_first.map(|target| target.resolve(&format));
        if let Some(sample) = seek_first {
            if !(0..play_samples).contains(&sample) {
                return Err(Error::Validation(format!(
                    "Seek to sample {} outside 0..{}",
                    sample, play_samples
                )));
            }
        }
        let seek_second = self.config.seek_second.map(|target| target.resolve(&format));

        if self.config.play_forever && !format.play_forever {
            return Err(Error::Validation("Stream can't be played forever".to_string()));
        }

        let output = self.output_name(input, subsong_index, &format);
        if output == input {
            return Err(Error::Validation(format!(
                "Same input and output name: {}",
                output
            )));
        }

        let description = describe(input, &output, &format);
        if self.config.to_stdout {
            info!("{}", description);
        } else {
            self.sink.print_info(&description);
        }

        if self.config.print_metadata_only {
            return Ok(());
        }

        let seeks = [seek_first, seek_second];
        self.write_file(session.as_mut(), &output, seeks)?;

        if self.config.test_reset {
            let reset_output = reset_name(&output);
            session.reset();
            self.write_file(session.as_mut(), &reset_output, seeks)?;
        }

        Ok(())
    }

    fn output_name(&self, input: &str, subsong_index: u32, format: &StreamFormat) -> String {
        if let Some(name) = &self.config.output_name {
            return name.clone();
        }

        let template = match &self.config.output_template {
            Some(template) => template.as_str(),
            None => default_template(subsong_index, format.subsong_count),
        };
        let fields = NameFields {
            input,
            subsong_index,
            stream_name: format.stream_name.as_deref(),
        };
        expand_template(template, &fields)
    }

    /// Decode `session` to `output` (or stdout).
    fn write_file(
        &mut self,
        session: &mut dyn DecodeSession,
        output: &str,
        seeks: [Option<i64>; 2],
    ) -> Result<()> {
        for sample in seeks.into_iter().flatten().filter(|s| *s >= 0) {
            session.seek(sample);
        }

        let format = session.format().clone();
        let mut writer: Option<Box<dyn Write>> = if self.config.decode_only {
            None
        } else if self.config.to_stdout {
            Some(self.sink.stdout())
        } else {
            Some(self.sink.create_file(output).map_err(|e| {
                Error::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to open {} for output: {}", output, e),
                ))
            })?)
        };

        let mut buf = Vec::with_capacity(self.config.sample_buffer_size * format.frame_size());

        if self.config.play_forever && !self.config.decode_only {
            if let Some(out) = writer.as_mut() {
                stream_forever(session, out.as_mut(), &mut buf, format.sample_size)?;
            }
            return Ok(());
        }

        if let Some(out) = writer.as_mut() {
            let header = self.wav_header(&format);
            let mut header_buf = [0u8; 0x100];
            let size = header.write_to(&mut header_buf)?;
            out.write_all(&header_buf[..size])?;
        }

        loop {
            let status = session
                .render(&mut buf)
                .map_err(|e| Error::Decode(format!("Render failed: {}", e)))?;
            match status {
                RenderStatus::Block { .. } => {
                    if let Some(out) = writer.as_mut() {
                        swap_samples_le(&mut buf, format.sample_size);
                        out.write_all(&buf)?;
                    }
                }
                RenderStatus::Done => break,
            }
        }

        if let Some(out) = writer.as_mut() {
            out.flush()?;
        }
        debug!("Wrote {}", output);
        Ok(())
    }

    fn wav_header(&self, format: &StreamFormat) -> WavHeader {
        let write_smpl_chunk = self.config.write_loop_markers && format.has_loop();
        let (loop_start, loop_end) = if write_smpl_chunk {
            (clamp_u32(format.loop_start), clamp_u32(format.loop_end - 1))
        } else {
            (0, 0)
        };

        WavHeader {
            sample_count: clamp_u32(format.play_samples),
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_size: format.sample_size as u16,
            is_float: format.sample_type.is_float(),
            write_smpl_chunk,
            loop_start,
            loop_end,
        }
    }
}

/// Pipe raw blocks until the session stops. No header is written.
fn stream_forever(
    session: &mut dyn DecodeSession,
    out: &mut dyn Write,
    buf: &mut Vec<u8>,
    sample_size: usize,
) -> Result<()> {
    loop {
        match session.render(buf) {
            Ok(RenderStatus::Block { .. }) => {
                swap_samples_le(buf, sample_size);
                out.write_all(buf)?;
            }
            Ok(RenderStatus::Done) => break,
            Err(e) => {
                warn!("Render failed, stopping: {}", e);
                break;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Short text description of an opened stream.
pub fn describe(input: &str, output: &str, format: &StreamFormat) -> String {
    let rate = format.sample_rate;
    let mut lines = vec![
        format!("input file: {}", input),
        format!("output file: {}", output),
        format!("sample rate: {} Hz", rate),
        format!("channels: {}", format.channels),
        format!("sample type: {:?}", format.sample_type),
    ];

    if format.has_loop() {
        lines.push(format!(
            "loop start: {} samples ({} seconds)",
            format.loop_start,
            seconds(format.loop_start, rate)
        ));
        lines.push(format!(
            "loop end: {} samples ({} seconds)",
            format.loop_end,
            seconds(format.loop_end, rate)
        ));
    }

    lines.push(format!(
        "play duration: {} samples ({} seconds)",
        format.play_samples,
        seconds(format.play_samples, rate)
    ));

    if format.subsong_count > 1 {
        lines.push(format!(
            "subsong: {} of {}",
            format.subsong_index, format.subsong_count
        ));
    }
    if let Some(name) = &format.stream_name {
        lines.push(format!("stream name: {}", name));
    }

    lines.join("\n")
}

/// `m:ss.mmm`
fn seconds(samples: i64, rate: u32) -> String {
    if rate == 0 {
        return "0:00.000".to_string();
    }
    let millis = samples.max(0) * 1000 / rate as i64;
    format!("{}:{:02}.{:03}", millis / 60_000, millis / 1000 % 60, millis % 1000)
}
