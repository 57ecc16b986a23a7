//! Integration tests for the audio converter.
//!
//! These tests run complete conversions through the public API and check
//! the observable guarantees: determinism, exact round trips, passthrough
//! copies, dither policy cutoffs, and buffer contract errors.

use pcm_convert::config::parse_properties;
use pcm_convert::converter::{AllocTarget, StageAlloc};
use pcm_convert::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn s16le(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn from_s16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn f32le(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn from_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Interleaved sine wave, a different frequency per channel.
fn sine(frames: usize, channels: usize, amplitude: f32) -> Vec<f32> {
    (0..frames * channels)
        .map(|i| {
            let (n, c) = (i / channels, i % channels);
            let phase = n as f32 * 0.013 * (c + 1) as f32;
            amplitude * phase.sin()
        })
        .collect()
}

fn convert(
    converter: &mut AudioConverter,
    input: &[u8],
    frames: usize,
    out_bytes_per_frame: usize,
) -> Vec<u8> {
    let mut output = vec![0u8; frames * out_bytes_per_frame];
    let done = converter
        .execute(&[input], frames, &mut [&mut output], frames)
        .unwrap();
    assert_eq!(done, (frames, frames));
    output
}

fn converter(input: AudioFormat, output: AudioFormat, config: &str) -> AudioConverter {
    let config: ConverterConfig = config.parse().unwrap();
    AudioConverter::new(input, output, config).unwrap()
}

// ============================================================================
// Stage Selection
// ============================================================================

#[test]
fn test_stereo_to_mono_s16_stages() {
    init_tracing();
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::S16Le, 48000, 1),
        "",
    );
    assert_eq!(
        conv.stages(),
        vec![
            StageKind::Unpack,
            StageKind::ConvertIn,
            StageKind::ChannelMix,
            StageKind::ConvertOut,
            StageKind::Pack,
        ]
    );
    assert!(!conv.is_passthrough());

    let input = s16le(&[1000, 3000, 100, 101, -32768, -32768, 0, 0]);
    let output = convert(&mut conv, &input, 4, 2);
    // 100.5 rounds away from zero.
    assert_eq!(from_s16le(&output), vec![2000, 101, -32768, 0]);
}

#[test]
fn test_float_to_s16_allocation() {
    let conv = converter(
        AudioFormat::new(SampleFormat::F32Le, 48000, 2),
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        "",
    );
    assert_eq!(
        conv.stages(),
        vec![
            StageKind::Unpack,
            StageKind::ConvertOut,
            StageKind::Quantize,
            StageKind::Pack,
        ]
    );
    assert_eq!(conv.allocation().len(), 3);
    assert!(
        conv.allocation()
            .iter()
            .all(|a| a.target == AllocTarget::Scratch)
    );
    assert_eq!(
        conv.allocation()[1],
        StageAlloc {
            target: AllocTarget::Scratch,
            in_place: true
        }
    );
}

#[test]
fn test_unpositioned_channel_change_fails() {
    let result = AudioConverter::new(
        AudioFormat::new(SampleFormat::S16Le, 48000, 8).unpositioned(),
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        ConverterConfig::default(),
    );
    assert_eq!(
        result.err(),
        Some(Error::UnpositionedChannels {
            input: 8,
            output: 2
        })
    );
}

#[test]
fn test_layout_mismatch_fails() {
    let result = AudioConverter::new(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::S16Le, 48000, 2).with_layout(AudioLayout::NonInterleaved),
        ConverterConfig::default(),
    );
    assert!(matches!(result, Err(Error::LayoutMismatch { .. })));
}

#[test]
fn test_rate_mismatch_fails() {
    let result = AudioConverter::new(
        AudioFormat::new(SampleFormat::F32Le, 44100, 2),
        AudioFormat::new(SampleFormat::F32Le, 48000, 2),
        ConverterConfig::default(),
    );
    assert!(matches!(result, Err(Error::RateMismatch { .. })));
}

// ============================================================================
// Conversion Results
// ============================================================================

#[test]
fn test_s16_f64_s16_round_trip() {
    let samples: Vec<i16> = (-32768i32..=32767).step_by(97).map(|v| v as i16).chain([32767]).collect();
    let frames = samples.len();
    let input = s16le(&samples);

    let mut to_float = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 1),
        AudioFormat::new(SampleFormat::F64, 48000, 1),
        "",
    );
    let mut to_int = converter(
        AudioFormat::new(SampleFormat::F64, 48000, 1),
        AudioFormat::new(SampleFormat::S16Le, 48000, 1),
        "",
    );

    let float = convert(&mut to_float, &input, frames, 8);
    let back = convert(&mut to_int, &float, frames, 2);
    assert_eq!(from_s16le(&back), samples);
}

#[test]
fn test_passthrough_is_raw_copy() {
    let format = AudioFormat::new(SampleFormat::S24Be, 96000, 2);
    let mut conv = converter(format.clone(), format, "dither-method=tpdf");
    assert!(conv.is_passthrough());

    let input: Vec<u8> = (0..60).map(|i| (i * 37 % 256) as u8).collect();
    let output = convert(&mut conv, &input, 10, 6);
    assert_eq!(output, input);
}

#[test]
fn test_mono_to_stereo_f32() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::F32Le, 44100, 1),
        AudioFormat::new(SampleFormat::F32Le, 44100, 2),
        "",
    );
    let input = f32le(&[0.25, -0.5, 1.0]);
    let output = convert(&mut conv, &input, 3, 8);
    assert_eq!(from_f32le(&output), vec![0.25, 0.25, -0.5, -0.5, 1.0, 1.0]);
}

#[test]
fn test_surround_downmix_keeps_sides_apart() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 6),
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        "",
    );
    assert!(conv.stages().contains(&StageKind::ChannelMix));

    let input = s16le(&[16384, 0, 0, 0, 0, 0]);
    let output = from_s16le(&convert(&mut conv, &input, 1, 4));
    assert!(output[0] > 0 && output[0] < 16384, "left = {}", output[0]);
    assert_eq!(output[1], 0);
}

#[test]
fn test_planar_float_to_s16() {
    let layout = AudioLayout::NonInterleaved;
    let mut conv = converter(
        AudioFormat::new(SampleFormat::F32Le, 48000, 2).with_layout(layout),
        AudioFormat::new(SampleFormat::S16Le, 48000, 2).with_layout(layout),
        "",
    );
    let left = f32le(&[0.5, 1.0]);
    let right = f32le(&[-0.25, -1.0]);
    let mut out_left = vec![0u8; 4];
    let mut out_right = vec![0u8; 4];
    conv.execute(
        &[&left, &right],
        2,
        &mut [&mut out_left, &mut out_right],
        2,
    )
    .unwrap();
    assert_eq!(from_s16le(&out_left), vec![16384, 32767]);
    assert_eq!(from_s16le(&out_right), vec![-8192, -32768]);
}

#[test]
fn test_unsigned_8_bit_to_s16() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::U8, 8000, 1),
        AudioFormat::new(SampleFormat::S16Le, 8000, 1),
        "",
    );
    assert_eq!(
        conv.stages(),
        vec![StageKind::Unpack, StageKind::Pack],
        "widening an integer needs no quantization"
    );
    let output = convert(&mut conv, &[0, 128, 255], 3, 2);
    assert_eq!(from_s16le(&output), vec![-32768, 0, 127 << 8]);
}

#[test]
fn test_writable_input_matches_shared() {
    let samples: Vec<u8> = (0..64i32)
        .map(|i| i.wrapping_mul(33_554_467))
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    let input = AudioFormat::new(SampleFormat::S32, 48000, 2);
    let output = AudioFormat::new(SampleFormat::S16Le, 48000, 2);

    let mut shared = converter(input.clone(), output.clone(), "");
    let expected = convert(&mut shared, &samples, 32, 4);

    let mut writable = converter(input, output, "");
    let mut scratch_input = samples.clone();
    let mut actual = vec![0u8; 128];
    writable
        .execute_writable(&mut [&mut scratch_input], 32, &mut [&mut actual], 32)
        .unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn test_frames_limited_by_shorter_side() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 1),
        AudioFormat::new(SampleFormat::F32Le, 48000, 1),
        "",
    );
    let input = s16le(&[16384; 8]);
    let mut output = vec![0u8; 12];
    let done = conv
        .execute(&[&input], 8, &mut [&mut output], 3)
        .unwrap();
    assert_eq!(done, (3, 3));
    assert_eq!(from_f32le(&output), vec![0.5; 3]);
}

// ============================================================================
// Dither and Noise Shaping
// ============================================================================

#[test]
fn test_dithered_output_is_deterministic() {
    let format_in = AudioFormat::new(SampleFormat::F32Le, 48000, 2);
    let format_out = AudioFormat::new(SampleFormat::S16Le, 48000, 2);
    let config = "dither-method=tpdf noise-shaping-method=high";
    let input = f32le(&sine(480, 2, 0.8));

    let mut first = converter(format_in.clone(), format_out.clone(), config);
    let mut second = converter(format_in.clone(), format_out.clone(), config);
    assert_eq!(
        first.quantize_methods(),
        (DitherMethod::Tpdf, NoiseShapingMethod::High)
    );

    for _ in 0..3 {
        assert_eq!(
            convert(&mut first, &input, 480, 4),
            convert(&mut second, &input, 480, 4)
        );
    }

    let mut plain = converter(format_in, format_out, "");
    assert_ne!(
        convert(&mut plain, &input, 480, 4),
        convert(&mut converter_like(&first), &input, 480, 4),
        "dither must change the output"
    );
}

fn converter_like(conv: &AudioConverter) -> AudioConverter {
    AudioConverter::new(
        conv.input_format().clone(),
        conv.output_format().clone(),
        *conv.config(),
    )
    .unwrap()
}

#[test]
fn test_deep_output_ignores_dither() {
    let format_in = AudioFormat::new(SampleFormat::F32Le, 48000, 2);
    let format_out = AudioFormat::new(SampleFormat::S24Le, 48000, 2);
    let input = f32le(&sine(256, 2, 0.9));

    let mut dithered = converter(
        format_in.clone(),
        format_out.clone(),
        "dither-method=triangular-high-frequency noise-shaping-method=high",
    );
    let mut plain = converter(format_in, format_out, "");
    assert_eq!(
        dithered.quantize_methods(),
        (DitherMethod::None, NoiseShapingMethod::None)
    );
    assert_eq!(
        convert(&mut dithered, &input, 256, 6),
        convert(&mut plain, &input, 256, 6)
    );
}

#[test]
fn test_low_rate_caps_noise_shaping() {
    let format_in = AudioFormat::new(SampleFormat::F32Le, 16000, 1);
    let format_out = AudioFormat::new(SampleFormat::S16Le, 16000, 1);
    let input = f32le(&sine(400, 1, 0.5));

    let mut high = converter(
        format_in.clone(),
        format_out.clone(),
        "noise-shaping-method=high",
    );
    let mut feedback = converter(format_in, format_out, "noise-shaping-method=error-feedback");
    assert_eq!(
        high.quantize_methods(),
        (DitherMethod::None, NoiseShapingMethod::ErrorFeedback)
    );
    assert_eq!(
        convert(&mut high, &input, 400, 2),
        convert(&mut feedback, &input, 400, 2)
    );
}

#[test]
fn test_set_config_changes_quantizer() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::F64, 48000, 1),
        AudioFormat::new(SampleFormat::U8, 48000, 1),
        "",
    );
    let stages = conv.stages();
    let props = parse_properties("dither-method=rpdf quantization-granularity=2").unwrap();
    conv.set_config(&props).unwrap();

    assert_eq!(conv.stages(), stages);
    assert_eq!(conv.config().quantization, 2);
    assert_eq!(conv.quantize_methods().0, DitherMethod::Rpdf);

    let snapshot = conv.config_properties();
    assert_eq!(
        ConverterConfig::from_properties(&snapshot).unwrap(),
        *conv.config()
    );
}

// ============================================================================
// Buffer Contract
// ============================================================================

#[test]
fn test_zero_frames_touch_nothing() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::F32Le, 48000, 1),
        "",
    );
    let input = s16le(&[1, 2, 3, 4]);
    let mut output = vec![0xAAu8; 8];

    assert_eq!(
        conv.execute(&[&input], 0, &mut [&mut output], 2).unwrap(),
        (0, 0)
    );
    assert_eq!(
        conv.execute(&[&input], 2, &mut [&mut output], 0).unwrap(),
        (0, 0)
    );
    assert_eq!(conv.execute(&[], 0, &mut [], 0).unwrap(), (0, 0));
    assert!(output.iter().all(|&b| b == 0xAA));
}

#[test]
fn test_short_output_rejected_before_writing() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::F32Le, 48000, 2),
        "",
    );
    let input = s16le(&[100; 8]);
    let mut output = vec![0x55u8; 24];
    let err = conv
        .execute(&[&input], 4, &mut [&mut output], 4)
        .unwrap_err();
    assert!(matches!(err, Error::Buffer(_)), "got {err}");
    assert!(output.iter().all(|&b| b == 0x55));
}

#[test]
fn test_wrong_block_count_rejected() {
    let layout = AudioLayout::NonInterleaved;
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2).with_layout(layout),
        AudioFormat::new(SampleFormat::S16Le, 48000, 1).with_layout(layout),
        "",
    );
    let left = s16le(&[1, 2]);
    let mut output = vec![0u8; 4];
    let result = conv.execute(&[&left], 2, &mut [&mut output], 2);
    assert!(matches!(result, Err(Error::Buffer(_))));
}

#[test]
fn test_oversized_frame_count_rejected() {
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::F32Le, 48000, 2),
        "",
    );
    let input = [0u8; 8];
    let mut output = [0x55u8; 16];
    let frames = usize::MAX / 2;
    let err = conv
        .execute(&[&input], frames, &mut [&mut output], frames)
        .unwrap_err();
    assert!(matches!(err, Error::Buffer(_)), "got {err}");
    assert!(output.iter().all(|&b| b == 0x55));
}

// ============================================================================
// Repeated Calls
// ============================================================================

#[test]
fn test_consecutive_calls_use_fresh_samples() {
    init_tracing();
    let mut conv = converter(
        AudioFormat::new(SampleFormat::S16Le, 48000, 2),
        AudioFormat::new(SampleFormat::S16Le, 48000, 1),
        "",
    );

    let first = convert(&mut conv, &s16le(&[100, 100, 200, 200]), 2, 2);
    assert_eq!(from_s16le(&first), vec![100, 200]);

    // More frames than before: scratch grows and no stage result is replayed.
    let second = convert(&mut conv, &s16le(&[1, 1, 2, 2, 3, 3, 4, 4]), 4, 2);
    assert_eq!(from_s16le(&second), vec![1, 2, 3, 4]);

    let third = convert(&mut conv, &s16le(&[-7, -9]), 1, 2);
    assert_eq!(from_s16le(&third), vec![-8]);
}
