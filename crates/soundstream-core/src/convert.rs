//! Conversion between on-disk sample words and native `f32` samples.
//!
//! Integer words are left-justified into 32 bits and scaled by `1 / 2^31`,
//! so 16- and 24-bit files share one dynamic range. Encoding is the inverse
//! with hard clipping at the largest representable magnitude. Float words
//! pass through unclipped.
//!
//! Files are interleaved by channel; native buffers are one slice per channel.

use crate::info::{Endianness, SampleFormat};

/// Scale applied to a left-justified 32-bit integer word.
const SCALE: f32 = 1.0 / 2_147_483_648.0;

const FULL_16: f64 = 32768.0;
const CLIP_16: i64 = 32767;
const FULL_24: f64 = 8_388_608.0;
const CLIP_24: i64 = 8_388_607;

/// Decode one sample word starting at `bytes[0]`.
#[inline]
pub fn decode_sample(bytes: &[u8], format: SampleFormat, endianness: Endianness) -> f32 {
    let big = endianness.is_big();
    match format {
        SampleFormat::Int16 => {
            let word = if big {
                (bytes[0] as u32) << 24 | (bytes[1] as u32) << 16
            } else {
                (bytes[1] as u32) << 24 | (bytes[0] as u32) << 16
            };
            word as i32 as f32 * SCALE
        }
        SampleFormat::Int24 => {
            let word = if big {
                (bytes[0] as u32) << 24 | (bytes[1] as u32) << 16 | (bytes[2] as u32) << 8
            } else {
                (bytes[2] as u32) << 24 | (bytes[1] as u32) << 16 | (bytes[0] as u32) << 8
            };
            word as i32 as f32 * SCALE
        }
        SampleFormat::Float32 => {
            let word = [bytes[0], bytes[1], bytes[2], bytes[3]];
            if big {
                f32::from_be_bytes(word)
            } else {
                f32::from_le_bytes(word)
            }
        }
    }
}

/// Offset-and-truncate quantization with symmetric hard clipping.
#[inline]
fn quantize(value: f32, full: f64, clip: i64) -> i64 {
    let word = (full + value as f64 * full) as i64 - full as i64;
    word.clamp(-clip, clip)
}

/// Encode one sample into `out[..format.bytes()]`, scaled by `gain` first.
#[inline]
pub fn encode_sample(
    value: f32,
    format: SampleFormat,
    endianness: Endianness,
    gain: f32,
    out: &mut [u8],
) {
    let big = endianness.is_big();
    match format {
        SampleFormat::Int16 => {
            let w = quantize(value * gain, FULL_16, CLIP_16);
            let (hi, lo) = ((w >> 8) as u8, w as u8);
            if big {
                out[0] = hi;
                out[1] = lo;
            } else {
                out[0] = lo;
                out[1] = hi;
            }
        }
        SampleFormat::Int24 => {
            let w = quantize(value * gain, FULL_24, CLIP_24);
            let (hi, mid, lo) = ((w >> 16) as u8, (w >> 8) as u8, w as u8);
            if big {
                out[0] = hi;
                out[1] = mid;
                out[2] = lo;
            } else {
                out[0] = lo;
                out[1] = mid;
                out[2] = hi;
            }
        }
        SampleFormat::Float32 => {
            let v = value * gain;
            let word = if big { v.to_be_bytes() } else { v.to_le_bytes() };
            out[..4].copy_from_slice(&word);
        }
    }
}

/// Deinterleave `frames` frames from `src` into `outputs[ch][offset..offset + frames]`.
///
/// Outputs past `file_channels` are zero-filled over the same range. File
/// channels past `outputs.len()` are skipped.
pub fn decode_interleaved<O: AsMut<[f32]>>(
    src: &[u8],
    file_channels: usize,
    format: SampleFormat,
    endianness: Endianness,
    outputs: &mut [O],
    offset: usize,
    frames: usize,
) {
    let bps = format.bytes();
    let bpf = bps * file_channels;
    for (ch, out) in outputs.iter_mut().enumerate() {
        let out = &mut out.as_mut()[offset..offset + frames];
        if ch >= file_channels {
            out.fill(0.0);
            continue;
        }
        for (frame, sample) in out.iter_mut().enumerate() {
            let at = frame * bpf + ch * bps;
            *sample = decode_sample(&src[at..at + bps], format, endianness);
        }
    }
}

/// Interleave `frames` frames of `inputs[ch][offset..]` into `dst`.
///
/// The file gets one channel per input slice.
pub fn encode_interleaved<I: AsRef<[f32]>>(
    inputs: &[I],
    offset: usize,
    frames: usize,
    format: SampleFormat,
    endianness: Endianness,
    gain: f32,
    dst: &mut [u8],
) {
    let bps = format.bytes();
    let bpf = bps * inputs.len();
    for (ch, input) in inputs.iter().enumerate() {
        let input = &input.as_ref()[offset..offset + frames];
        for (frame, &sample) in input.iter().enumerate() {
            let at = frame * bpf + ch * bps;
            encode_sample(sample, format, endianness, gain, &mut dst[at..at + bps]);
        }
    }
}

/// Largest absolute sample over `frames` frames starting at `offset`.
pub fn peak<I: AsRef<[f32]>>(inputs: &[I], offset: usize, frames: usize) -> f32 {
    inputs
        .iter()
        .flat_map(|ch| ch.as_ref()[offset..offset + frames].iter())
        .fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Gain that maps `peak` just inside full scale. Silence gets unity gain.
pub fn normalization_factor(peak: f32) -> f32 {
    if peak > 0.0 {
        32767.0 / (32768.0 * peak)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const BE: Endianness = Endianness::Big;
    const LE: Endianness = Endianness::Little;

    #[test]
    fn test_decode_int16_full_scale() {
        assert_eq!(decode_sample(&[0x7f, 0xff], SampleFormat::Int16, BE), 32767.0 / 32768.0);
        assert_eq!(decode_sample(&[0x80, 0x00], SampleFormat::Int16, BE), -1.0);
        assert_eq!(decode_sample(&[0x00, 0x80], SampleFormat::Int16, LE), -1.0);
        assert_eq!(decode_sample(&[0x00, 0x40], SampleFormat::Int16, LE), 0.5);
    }

    #[test]
    fn test_decode_int24() {
        assert_eq!(decode_sample(&[0x40, 0, 0], SampleFormat::Int24, BE), 0.5);
        assert_eq!(decode_sample(&[0, 0, 0xc0], SampleFormat::Int24, LE), -0.5);
        assert_eq!(
            decode_sample(&[0xff, 0xff, 0xff], SampleFormat::Int24, BE),
            -1.0 / 8_388_608.0
        );
    }

    #[test]
    fn test_encode_clips_integers() {
        let mut out = [0u8; 3];
        encode_sample(1.5, SampleFormat::Int16, BE, 1.0, &mut out);
        assert_eq!(&out[..2], &[0x7f, 0xff]);
        encode_sample(-4.0, SampleFormat::Int16, LE, 1.0, &mut out);
        assert_eq!(&out[..2], &[0x01, 0x80]);
        encode_sample(1.5, SampleFormat::Int24, LE, 1.0, &mut out);
        assert_eq!(out, [0xff, 0xff, 0x7f]);
        encode_sample(-1.0, SampleFormat::Int24, BE, 1.0, &mut out);
        assert_eq!(out, [0x80, 0x00, 0x01]);
    }

    #[test]
    fn test_float_is_not_clipped() {
        let mut out = [0u8; 4];
        encode_sample(1.5, SampleFormat::Float32, BE, 1.0, &mut out);
        assert_eq!(out, 1.5f32.to_be_bytes());
        assert_eq!(decode_sample(&out, SampleFormat::Float32, BE), 1.5);
        encode_sample(-3.0, SampleFormat::Float32, LE, 0.5, &mut out);
        assert_eq!(decode_sample(&out, SampleFormat::Float32, LE), -1.5);
    }

    #[test]
    fn test_interleave_extra_outputs_zeroed() {
        // Two file channels, three outputs: the third is silenced.
        let left = [0.25f32, -0.5];
        let right = [0.5f32, 0.75];
        let mut bytes = [0u8; 8];
        encode_interleaved(&[&left[..], &right[..]], 0, 2, SampleFormat::Int16, LE, 1.0, &mut bytes);

        let mut outs = vec![vec![9.0f32; 2]; 3];
        decode_interleaved(&bytes, 2, SampleFormat::Int16, LE, &mut outs, 0, 2);
        assert_eq!(outs[0], left);
        assert_eq!(outs[1], right);
        assert_eq!(outs[2], [0.0, 0.0]);
    }

    #[test]
    fn test_interleave_extra_file_channels_dropped() {
        let chans = [[0.125f32; 4], [0.25; 4], [0.5; 4]];
        let mut bytes = vec![0u8; 4 * 3 * 3];
        encode_interleaved(&chans, 0, 4, SampleFormat::Int24, BE, 1.0, &mut bytes);

        let mut outs = [[0.0f32; 6]];
        decode_interleaved(&bytes, 3, SampleFormat::Int24, BE, &mut outs, 2, 4);
        assert_eq!(outs[0], [0.0, 0.0, 0.125, 0.125, 0.125, 0.125]);
    }

    #[test]
    fn test_peak_and_normalization() {
        let chans = [vec![0.1f32, -2.0, 0.3], vec![1.5f32, 0.0, 0.0]];
        assert_eq!(peak(&chans, 0, 3), 2.0);
        assert_eq!(peak(&chans, 2, 1), 0.3);
        assert_relative_eq!(normalization_factor(2.0), 32767.0 / 65536.0);
        assert_eq!(normalization_factor(0.0), 1.0);
    }

    proptest! {
        #[test]
        fn test_int16_roundtrip_within_one_lsb(v in -1.0f32..1.0, big in any::<bool>()) {
            let e = if big { BE } else { LE };
            let mut out = [0u8; 2];
            encode_sample(v, SampleFormat::Int16, e, 1.0, &mut out);
            let back = decode_sample(&out, SampleFormat::Int16, e);
            prop_assert!((back - v).abs() <= 1.0 / 32768.0 + f32::EPSILON);
        }

        #[test]
        fn test_int24_roundtrip_within_one_lsb(v in -1.0f32..1.0, big in any::<bool>()) {
            let e = if big { BE } else { LE };
            let mut out = [0u8; 3];
            encode_sample(v, SampleFormat::Int24, e, 1.0, &mut out);
            let back = decode_sample(&out, SampleFormat::Int24, e);
            prop_assert!((back - v).abs() <= 1.0 / 8_388_608.0 + f32::EPSILON);
        }
    }
}
