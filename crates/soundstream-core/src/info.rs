//! In-memory description of a PCM/float sample stream.

use serde::{Deserialize, Serialize};

/// Byte order of multi-byte sample words and header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    #[inline]
    pub fn is_big(self) -> bool {
        self == Self::Big
    }

    /// Parse the single-letter form used by raw-format flags (`b`, `l`, `n`).
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'b' | 'B' => Some(Self::Big),
            'l' | 'L' => Some(Self::Little),
            'n' | 'N' => Some(Self::native()),
            _ => None,
        }
    }
}

/// On-disk sample word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 16-bit signed integer PCM.
    #[default]
    Int16,
    /// 24-bit signed integer PCM.
    Int24,
    /// 32-bit IEEE float.
    Float32,
}

impl SampleFormat {
    /// Bytes per sample word (2, 3 or 4).
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Float32 => 4,
        }
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        (self.bytes() * 8) as u16
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }

    /// Map a byte width to a format. Four bytes always means float.
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            2 => Some(Self::Int16),
            3 => Some(Self::Int24),
            4 => Some(Self::Float32),
            _ => None,
        }
    }
}

/// Describes one open stream.
///
/// `bytes_per_frame` is derived from the channel count and the sample
/// format and is recomputed by every setter that touches either. It is
/// also recomputed on deserialize; a serialized value is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InfoFields")]
pub struct SoundFileInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    channels: usize,
    format: SampleFormat,
    /// Byte offset of the first sample, `None` while unknown.
    pub header_size: Option<u64>,
    /// Byte order of the sample words.
    pub endianness: Endianness,
    /// Remaining readable (or writable) data bytes.
    pub byte_limit: u64,
    bytes_per_frame: usize,
}

/// Deserialized form of [`SoundFileInfo`], before the derived fields are rebuilt.
#[derive(Deserialize)]
struct InfoFields {
    sample_rate: u32,
    channels: usize,
    format: SampleFormat,
    header_size: Option<u64>,
    endianness: Endianness,
    byte_limit: u64,
}

impl From<InfoFields> for SoundFileInfo {
    fn from(fields: InfoFields) -> Self {
        let mut info = Self::new(fields.sample_rate, fields.channels, fields.format, fields.endianness);
        info.header_size = fields.header_size;
        info.byte_limit = fields.byte_limit;
        info
    }
}

impl Default for SoundFileInfo {
    /// The "cleared" state used before any open attempt.
    fn default() -> Self {
        Self {
            sample_rate: 0,
            channels: 1,
            format: SampleFormat::Int16,
            header_size: None,
            endianness: Endianness::native(),
            byte_limit: Self::UNBOUNDED,
            bytes_per_frame: SampleFormat::Int16.bytes(),
        }
    }
}

impl SoundFileInfo {
    /// Sentinel byte limit meaning "no limit".
    pub const UNBOUNDED: u64 = i64::MAX as u64;

    pub fn new(
        sample_rate: u32,
        channels: usize,
        format: SampleFormat,
        endianness: Endianness,
    ) -> Self {
        let channels = channels.max(1);
        Self {
            sample_rate,
            channels,
            format,
            header_size: None,
            endianness,
            byte_limit: Self::UNBOUNDED,
            bytes_per_frame: channels * format.bytes(),
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes()
    }

    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    #[inline]
    pub fn is_big_endian(&self) -> bool {
        self.endianness.is_big()
    }

    /// Set the channel count (clamped to at least one).
    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.max(1);
        self.bytes_per_frame = self.channels * self.format.bytes();
    }

    pub fn set_format(&mut self, format: SampleFormat) {
        self.format = format;
        self.bytes_per_frame = self.channels * format.bytes();
    }

    /// Whole frames covered by `byte_limit`, `None` when unbounded.
    pub fn frames(&self) -> Option<u64> {
        if self.byte_limit >= Self::UNBOUNDED {
            None
        } else {
            Some(self.byte_limit / self.bytes_per_frame as u64)
        }
    }

    /// Back to the cleared state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
