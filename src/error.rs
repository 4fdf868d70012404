//! Centralized error type for the soundstream umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] soundstream_core::Error),

    #[cfg(feature = "streaming")]
    #[error("Streaming: {0}")]
    Streaming(#[from] soundstream_butler::Error),

    #[error("no channels given")]
    NoChannels,

    #[error("{0} channels exceeds the limit of {max}", max = soundstream_core::MAX_CHANNELS)]
    TooManyChannels(usize),

    #[error("no samples at onset {0}")]
    NoSamplesAtOnset(usize),

    /// The file was closed with a header matching the frames that made it.
    #[error("{written} of {expected} frames written: {source}")]
    ShortWrite {
        written: u64,
        expected: u64,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
