//! Test helpers and fixtures for soundstream integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): float files, unity gain
//! - `INT16_EPSILON` / `INT24_EPSILON`: one quantization step
//! - `SILENCE_THRESHOLD` (0.0001): silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use std::path::{Path, PathBuf};

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: u32 = 48000;

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Scratch directory removed when the guard drops.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create scratch directory")
}

pub fn scratch_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Ramp of exact 16-bit grid values, distinct per channel.
pub fn generate_ramp(channel: usize, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| ((i as i32 * 7 + channel as i32 * 1000) % 65536 - 32768) as f32 / 32768.0)
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if two signals are approximately equal within tolerance.
pub fn signals_approx_equal(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}
