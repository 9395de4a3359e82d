//! Symphonia engine tests
//!
//! Decodes hound-generated WAV files through buffered streams over the real
//! filesystem, then runs the full converter end to end.

mod helpers;

use std::sync::Arc;

use helpers::audio_generator::{generate_pcm24_wav, generate_ramp_wav, ramp_sample, TEST_SAMPLE_RATE};
use helpers::config_from;
use vgmconv_cli::audio::{
    DecodeEngine, DecodeSession, EngineConfig, OpenOptions, RenderStatus, SampleType,
    SymphoniaEngine,
};
use vgmconv_cli::convert::{Converter, FileSink};
use vgmconv_common::{StdFileSystem, StreamFactory};

fn open(path: &str, config: &EngineConfig, options: &OpenOptions) -> vgmconv_cli::Result<Box<dyn DecodeSession>> {
    let factory = StreamFactory::new(Arc::new(StdFileSystem));
    let mut stream = factory.open(path)?;
    let session = SymphoniaEngine::new().open(stream.as_ref(), config, options);
    stream.close();
    session
}

fn render_all(session: &mut dyn DecodeSession) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = Vec::new();
    while let RenderStatus::Block { .. } = session.render(&mut buf).unwrap() {
        out.extend_from_slice(&buf);
    }
    out
}

fn native_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

#[test]
fn test_decode_wav_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 2, 4000).unwrap();

    let session = open(
        path.to_str().unwrap(),
        &EngineConfig::default(),
        &OpenOptions::default(),
    )
    .unwrap();
    let format = session.format();

    assert_eq!(format.channels, 2);
    assert_eq!(format.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(format.sample_type, SampleType::Pcm16);
    assert_eq!(format.sample_size, 2);
    assert_eq!(format.play_samples, 4000);
    assert!(!format.has_loop());
    assert!(!format.play_forever);
    assert_eq!(format.subsong_count, 1);
    assert_eq!(format.subsong_index, 1);
}

#[test]
fn test_decoded_samples_match_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 2, 3000).unwrap();

    let config = EngineConfig {
        render_frames: 500,
        ..EngineConfig::default()
    };
    let mut session = open(path.to_str().unwrap(), &config, &OpenOptions::default()).unwrap();
    let samples = native_i16(&render_all(session.as_mut()));

    assert_eq!(samples.len(), 3000 * 2);
    for frame in (0..3000).step_by(97) {
        for channel in 0..2 {
            let expected = ramp_sample(frame, channel) as i32;
            let actual = samples[frame * 2 + channel] as i32;
            assert!((expected - actual).abs() <= 1, "frame {} channel {}", frame, channel);
        }
    }
}

#[test]
fn test_reset_redecode_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 1, 2000).unwrap();

    let config = EngineConfig {
        force_loop: true,
        loop_count: 1.5,
        fade_time: 0.1,
        render_frames: 333,
        ..EngineConfig::default()
    };
    let mut session = open(path.to_str().unwrap(), &config, &OpenOptions::default()).unwrap();
    assert_eq!(session.format().play_samples, 3000 + 800);

    let first = render_all(session.as_mut());
    session.reset();
    let second = render_all(session.as_mut());

    assert_eq!(first.len(), 3800 * 2);
    assert_eq!(first, second);
}

#[test]
fn test_seek_then_render() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 1, 2000).unwrap();

    let mut session = open(
        path.to_str().unwrap(),
        &EngineConfig::default(),
        &OpenOptions::default(),
    )
    .unwrap();
    session.seek(1500);
    let samples = native_i16(&render_all(session.as_mut()));

    assert_eq!(samples.len(), 500);
    assert!((samples[0] as i32 - ramp_sample(1500, 0) as i32).abs() <= 1);
}

#[test]
fn test_count_subsongs_without_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 2, 1000).unwrap();

    let factory = StreamFactory::new(Arc::new(StdFileSystem));
    let mut stream = factory.open(path.to_str().unwrap()).unwrap();
    let count = SymphoniaEngine::new()
        .count_subsongs(stream.as_ref(), &OpenOptions::default())
        .unwrap();
    stream.close();

    assert_eq!(count, 1);
}

#[test]
fn test_subsong_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 1, 100).unwrap();

    let options = OpenOptions {
        subsong_index: 2,
        stereo_track: None,
    };
    let result = open(path.to_str().unwrap(), &EngineConfig::default(), &options);
    assert!(matches!(result, Err(vgmconv_cli::Error::Format(_))));
}

#[test]
fn test_unrecognized_input_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.bin");
    std::fs::write(&path, vec![0x5au8; 4096]).unwrap();

    let result = open(path.to_str().unwrap(), &EngineConfig::default(), &OpenOptions::default());
    assert!(matches!(result, Err(vgmconv_cli::Error::Format(_))));
}

#[test]
fn test_stereo_track_selection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quad.wav");
    generate_ramp_wav(&path, 4, 1000).unwrap();

    let options = OpenOptions {
        subsong_index: 0,
        stereo_track: Some(1),
    };
    let mut session = open(path.to_str().unwrap(), &EngineConfig::default(), &options).unwrap();
    assert_eq!(session.format().channels, 2);

    let samples = native_i16(&render_all(session.as_mut()));
    assert!((samples[0] as i32 - ramp_sample(0, 2) as i32).abs() <= 1);
    assert!((samples[1] as i32 - ramp_sample(0, 3) as i32).abs() <= 1);
}

#[test]
fn test_original_width_and_float_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep.wav");
    generate_pcm24_wav(&path, 500).unwrap();

    let original = EngineConfig {
        force_pcm16: false,
        ..EngineConfig::default()
    };
    let mut session = open(path.to_str().unwrap(), &original, &OpenOptions::default()).unwrap();
    assert_eq!(session.format().sample_type, SampleType::Pcm24);
    assert_eq!(render_all(session.as_mut()).len(), 500 * 3);

    let float = EngineConfig {
        force_pcm16: false,
        force_float: true,
        ..EngineConfig::default()
    };
    let mut session = open(path.to_str().unwrap(), &float, &OpenOptions::default()).unwrap();
    assert_eq!(session.format().sample_type, SampleType::Float);
    assert_eq!(render_all(session.as_mut()).len(), 500 * 4);
}

#[test]
fn test_convert_wav_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ramp.wav");
    generate_ramp_wav(&input, 2, 2500).unwrap();
    let input = input.to_str().unwrap().to_string();

    let config = config_from(&["-r", input.as_str()]);
    config.validate(false).unwrap();
    let mut converter = Converter::new(config, Arc::new(StdFileSystem), SymphoniaEngine::new(), FileSink);
    let summary = converter.run();
    assert_eq!(summary.converted, 1);

    let output = format!("{}.wav", input);
    let mut reader = hound::WavReader::open(&output).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 2500 * 2);
    assert!((samples[2 * 100 + 1] as i32 - ramp_sample(100, 1) as i32).abs() <= 1);

    let reset_output = format!("{}.reset.wav", output);
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&reset_output).unwrap());
}
