//! Request and state types shared by a front end and its butler thread.

use std::path::{Path, PathBuf};

use soundstream_core::{Endianness, SampleFormat, SoundFileInfo};
use soundstream_formats::{FormatHint, RawFormat, WriteTarget};

/// Pending command for the butler, written by the front end under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCode {
    /// Nothing to do.
    #[default]
    Nothing,
    /// Open the file described by the queued parameters.
    Open,
    /// A file is open and being transferred.
    Busy,
    /// Finish the current file and stay alive.
    Close,
    /// Finish the current file and exit.
    Quit,
}

/// Callback side state of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// No transfer; the callback outputs silence.
    #[default]
    Idle,
    /// Opened and waiting for `start`.
    Startup,
    /// Moving one block per callback.
    Streaming,
}

/// File to play back.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub path: PathBuf,
    /// Frames to skip before the first block.
    pub onset_frames: u64,
    pub hint: FormatHint,
}

impl ReadRequest {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            onset_frames: 0,
            hint: FormatHint::Detect,
        }
    }

    pub fn skip_frames(mut self, frames: u64) -> Self {
        self.onset_frames = frames;
        self
    }

    /// Treat the file as headerless with the given layout.
    pub fn raw(mut self, layout: RawFormat) -> Self {
        self.hint = FormatHint::Raw(layout);
        self
    }
}

/// File to record into. Unset fields fall back to the registry's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteRequest {
    pub path: PathBuf,
    /// Registry name such as `"aiff"`; otherwise taken from the suffix.
    pub file_type: Option<String>,
    pub format: SampleFormat,
    pub endianness: Option<Endianness>,
    pub sample_rate: Option<u32>,
}

impl WriteRequest {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn file_type(mut self, name: impl Into<String>) -> Self {
        self.file_type = Some(name.into());
        self
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

/// A write request after the front end resolved its container and layout.
#[derive(Debug, Clone)]
pub(crate) struct WriteJob {
    pub target: WriteTarget,
    pub info: SoundFileInfo,
}
