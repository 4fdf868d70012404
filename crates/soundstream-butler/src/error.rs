//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Codec or file error, passed through unchanged.
    #[error(transparent)]
    Format(#[from] soundstream_core::Error),

    /// `start` without a prior `open`.
    #[error("start requested with no prior open")]
    StartWithoutOpen,

    /// Block size does not divide the configured maximum.
    #[error("block size {0} must divide the maximum block size {1}")]
    InvalidBlockSize(usize, usize),

    /// Inconsistent buffer configuration.
    #[error("invalid buffer configuration: {0}")]
    InvalidConfig(String),

    /// Too many stream channels.
    #[error("{0} channels requested, at most {max} supported", max = soundstream_core::MAX_CHANNELS)]
    TooManyChannels(usize),

    /// Butler thread could not be started.
    #[error("failed to spawn butler thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
