//! # soundstream
//!
//! Sound file codecs and streaming for real-time audio.
//!
//! ## Architecture
//!
//! soundstream is an umbrella crate over:
//! - **soundstream-core** - `SoundFileInfo`, sample formats, sample conversion
//! - **soundstream-formats** - WAVE, AIFF/AIFF-C, CAF, NeXT/AU and raw codecs
//! - **soundstream-butler** - background-thread streaming to and from an audio callback
//!
//! The [`soundfiler`] module reads and writes whole files synchronously.
//!
//! ## Quick Start
//!
//! ```ignore
//! use soundstream::prelude::*;
//!
//! // Whole-file read
//! let mut channels = vec![Vec::new(), Vec::new()];
//! soundfiler::read("loop.wav", &mut channels, &ReadOptions::new().resize())?;
//!
//! // Streaming playback
//! let reader = SoundFileReader::new(2)?;
//! reader.open(ReadRequest::new("loop.wav"));
//! reader.start()?;
//! // once per audio block:
//! reader.process(&mut outputs);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Codecs, soundfiler and streaming
//! - `streaming` - Reader/writer front ends with their butler threads

/// Re-export of soundstream-core for direct access
pub use soundstream_core as core;

/// Re-export of soundstream-formats for direct access
pub use soundstream_formats as formats;

pub use soundstream_core::{convert, Endianness, SampleFormat, SoundFileInfo};
pub use soundstream_formats::{FileTypeDescriptor, FormatHint, RawFormat, SoundFileRegistry};

#[cfg(feature = "streaming")]
pub use soundstream_butler as streaming;

#[cfg(feature = "streaming")]
pub use soundstream_butler::{
    BlockStatus, BufferConfig, ReadRequest, RequestCode, SoundFileReader, SoundFileWriter,
    StreamState, StreamStatus, TransferMetricsSnapshot, WriteRequest,
};

mod error;
pub mod soundfiler;

pub use error::{Error, Result};
pub use soundfiler::{ReadOptions, ReadOutcome, WriteOptions, WriteOutcome};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::soundfiler::{self, ReadOptions, WriteOptions};
    pub use crate::{Endianness, RawFormat, SampleFormat, SoundFileInfo};

    #[cfg(feature = "streaming")]
    pub use crate::streaming::{
        BlockStatus, BufferConfig, ReadRequest, SoundFileReader, SoundFileWriter, WriteRequest,
    };
}
