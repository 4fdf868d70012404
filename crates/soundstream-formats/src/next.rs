//! NeXT/Sun `.snd` / `.au`.
//!
//! One fixed 24-byte header followed by a free-text info field that runs up
//! to the data onset. The magic word doubles as the byte order marker.

use std::io::{Seek, SeekFrom, Write};

use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo, MAX_CHANNELS};

use crate::cursor::{u32_bytes, ChunkReader, FieldWriter};
use crate::registry::{FileTypeDescriptor, ReadSeek, WriteSeek};

const FIXED_HEADER: u64 = 24;
const LENGTH_OFFSET: u64 = 8;
/// Data length meaning "up to the end of the file".
const UNKNOWN_SIZE: u32 = u32::MAX;

const ENCODING_LINEAR_16: u32 = 3;
const ENCODING_LINEAR_24: u32 = 4;
const ENCODING_FLOAT: u32 = 6;

/// Parsed `.snd` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHeader {
    pub endianness: Endianness,
    pub onset: u32,
    pub length: u32,
    pub encoding: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub info: String,
}

impl NextHeader {
    fn magic(endianness: Endianness) -> &'static [u8; 4] {
        match endianness {
            Endianness::Big => b".snd",
            Endianness::Little => b"dns.",
        }
    }

    fn sample_format(&self) -> Result<SampleFormat> {
        match self.encoding {
            ENCODING_LINEAR_16 => Ok(SampleFormat::Int16),
            ENCODING_LINEAR_24 => Ok(SampleFormat::Int24),
            ENCODING_FLOAT => Ok(SampleFormat::Float32),
            5 => Err(Error::unsupported("32-bit integer samples")),
            other => Err(Error::unsupported(format!("NeXT encoding {other}"))),
        }
    }

    fn encoding_for(format: SampleFormat) -> u32 {
        match format {
            SampleFormat::Int16 => ENCODING_LINEAR_16,
            SampleFormat::Int24 => ENCODING_LINEAR_24,
            SampleFormat::Float32 => ENCODING_FLOAT,
        }
    }

    /// Info field as written: NUL padded to a multiple of four, at least four.
    fn info_bytes(&self) -> Vec<u8> {
        let mut bytes = self.info.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::new(self.endianness);
        w.bytes(Self::magic(self.endianness))
            .u32(self.onset)
            .u32(self.length)
            .u32(self.encoding)
            .u32(self.sample_rate)
            .u32(self.channels)
            .bytes(&self.info_bytes());
        w.into_inner()
    }
}

fn data_length(info: &SoundFileInfo, frames: u64) -> u32 {
    let bytes = frames.saturating_mul(info.bytes_per_frame() as u64);
    if bytes >= UNKNOWN_SIZE as u64 {
        UNKNOWN_SIZE
    } else {
        bytes as u32
    }
}

fn header_for(info: &SoundFileInfo, length: u32) -> NextHeader {
    let mut header = NextHeader {
        endianness: info.endianness,
        onset: 0,
        length,
        encoding: NextHeader::encoding_for(info.format()),
        sample_rate: info.sample_rate,
        channels: info.channels() as u32,
        info: String::new(),
    };
    header.onset = FIXED_HEADER as u32 + header.info_bytes().len() as u32;
    header
}

#[derive(Debug)]
pub struct NextFormat;

pub(crate) static NEXT: NextFormat = NextFormat;

impl FileTypeDescriptor for NextFormat {
    fn name(&self) -> &'static str {
        "next"
    }

    fn min_header_size(&self) -> usize {
        FIXED_HEADER as usize + 4
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["snd", "au"]
    }

    fn detect(&self, probe: &[u8]) -> bool {
        probe.len() >= 4 && matches!(&probe[..4], b".snd" | b"dns.")
    }

    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo> {
        let mut probe = ChunkReader::new(file, Endianness::Big)?;
        let magic = probe.read_bytes(4)?;
        let endianness = match magic.as_slice() {
            b".snd" => Endianness::Big,
            b"dns." => Endianness::Little,
            _ => return Err(Error::malformed("not a NeXT/AU file")),
        };
        drop(probe);

        let mut r = ChunkReader::new(file, endianness)?;
        let mut f = r.fields(FIXED_HEADER as usize)?;
        f.skip(4)?;
        let mut header = NextHeader {
            endianness,
            onset: f.u32()?,
            length: f.u32()?,
            encoding: f.u32()?,
            sample_rate: f.u32()?,
            channels: f.u32()?,
            info: String::new(),
        };
        if (header.onset as u64) < FIXED_HEADER {
            return Err(Error::malformed(format!("data onset {}", header.onset)));
        }
        let info_len = (header.onset as u64 - FIXED_HEADER).min(r.remaining()) as usize;
        let text = r.read_bytes(info_len)?;
        header.info = String::from_utf8_lossy(&text)
            .trim_end_matches('\0')
            .to_string();
        if !header.info.is_empty() {
            tracing::trace!(info = %header.info, "NeXT info field");
        }

        let format = header.sample_format()?;
        if header.channels == 0 || header.channels as usize > MAX_CHANNELS {
            return Err(Error::malformed(format!("{} channels", header.channels)));
        }
        let mut info = SoundFileInfo::new(
            header.sample_rate,
            header.channels as usize,
            format,
            endianness,
        );
        info.header_size = Some(header.onset as u64);
        info.byte_limit = if header.length == UNKNOWN_SIZE {
            r.len().saturating_sub(header.onset as u64)
        } else {
            header.length as u64
        };
        Ok(info)
    }

    fn write_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<u64> {
        let length = if frames == 0 {
            UNKNOWN_SIZE
        } else {
            data_length(info, frames)
        };
        let header = header_for(info, length);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        Ok(header.onset as u64)
    }

    fn update_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<()> {
        let resume = file.stream_position()?;
        file.seek(SeekFrom::Start(LENGTH_OFFSET))?;
        file.write_all(&u32_bytes(data_length(info, frames), info.endianness))?;
        file.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    fn endianness(&self, requested: Option<Endianness>, _format: SampleFormat) -> Endianness {
        requested.unwrap_or(Endianness::Big)
    }
}
