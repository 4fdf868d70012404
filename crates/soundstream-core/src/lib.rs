//! Core types for soundstream.
//!
//! - [`SoundFileInfo`]: format of one open stream
//! - [`SampleFormat`] / [`Endianness`]: on-disk sample word layout
//! - [`convert`]: sample word <-> `f32` conversion with channel (de)interleaving
//! - [`Error`]: error kinds shared by every codec

pub mod convert;
pub mod error;
mod info;

pub use error::{Error, Result};
pub use info::{Endianness, SampleFormat, SoundFileInfo};

/// Default sample rate for files written without an explicit rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Largest channel count any codec accepts.
pub const MAX_CHANNELS: usize = 64;
