//! Tolerance constants for sample comparisons.
//!
//! Integer formats are exact on grid values and off by at most one
//! quantization step elsewhere.

/// Float passthrough (32-bit float files, unity gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;

/// 24-bit quantization step size.
pub const INT24_EPSILON: f32 = 1.0 / 8388608.0;

/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;
