//! Error types shared by the codecs and the sound file helpers.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Structurally invalid or truncated container.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Bit depth or sample encoding not implemented.
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Container revision not implemented.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// No registered file type goes by this name.
    #[error("unknown file type: {0}")]
    UnknownFileType(String),

    /// Underlying read, write or seek failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Clean end of stream.
    #[error("end of file")]
    Eof,
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedSampleFormat(msg.into())
    }

    /// True for [`Error::Eof`], which is not a failure.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Platform error code of an I/O failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
