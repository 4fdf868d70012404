//! Headerless sample data.
//!
//! The file carries no description of itself: channel count, sample width,
//! byte order and a number of leading bytes to skip all come from the caller
//! as a [`RawFormat`].

use std::io::{Seek, SeekFrom};

use serde::{Deserialize, Serialize};
use soundstream_core::{Endianness, Result, SampleFormat, SoundFileInfo};

use crate::registry::{FileTypeDescriptor, ReadSeek, WriteSeek};

/// Caller-supplied layout of a headerless file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFormat {
    /// Bytes to skip before the first sample.
    pub header_size: u64,
    pub channels: usize,
    pub format: SampleFormat,
    /// `None` means host order.
    pub endianness: Option<Endianness>,
}

impl Default for RawFormat {
    fn default() -> Self {
        Self {
            header_size: 0,
            channels: 1,
            format: SampleFormat::Int16,
            endianness: None,
        }
    }
}

impl RawFormat {
    pub fn new(channels: usize, format: SampleFormat) -> Self {
        Self {
            channels,
            format,
            ..Default::default()
        }
    }

    pub fn header_size(mut self, bytes: u64) -> Self {
        self.header_size = bytes;
        self
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    /// Overlay this layout on the file-level fields a raw descriptor read.
    pub fn apply(&self, info: &mut SoundFileInfo) {
        let file_len = info.byte_limit;
        info.set_channels(self.channels);
        info.set_format(self.format);
        info.endianness = self.endianness.unwrap_or_else(Endianness::native);
        info.header_size = Some(self.header_size);
        info.byte_limit = file_len.saturating_sub(self.header_size);
    }
}

#[derive(Debug)]
pub struct RawFileFormat;

pub(crate) static RAW: RawFileFormat = RawFileFormat;

impl FileTypeDescriptor for RawFileFormat {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn min_header_size(&self) -> usize {
        0
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Raw data is never detected.
    fn detect(&self, _probe: &[u8]) -> bool {
        false
    }

    /// Reports the whole file as data; see [`RawFormat::apply`].
    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo> {
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let mut info = SoundFileInfo::default();
        info.header_size = Some(0);
        info.byte_limit = len;
        Ok(info)
    }

    fn write_header(&self, file: &mut dyn WriteSeek, _: &SoundFileInfo, _: u64) -> Result<u64> {
        file.seek(SeekFrom::Start(0))?;
        Ok(0)
    }

    fn update_header(&self, _: &mut dyn WriteSeek, _: &SoundFileInfo, _: u64) -> Result<()> {
        Ok(())
    }

    fn endianness(&self, requested: Option<Endianness>, _format: SampleFormat) -> Endianness {
        requested.unwrap_or_else(Endianness::native)
    }
}
