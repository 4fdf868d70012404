//! Core Audio Format.
//!
//! Big-endian chunks with 12-byte headers and signed 64-bit sizes. The `desc`
//! chunk must come first; a `data` size of -1 runs to the end of the file.

use std::io::{Seek, SeekFrom, Write};

use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo, MAX_CHANNELS};

use crate::cursor::{ChunkReader, FieldCursor, FieldWriter, SizeField};
use crate::registry::{FileTypeDescriptor, ReadSeek, WriteSeek};

const FILE_HEADER: u64 = 8;
const CHUNK_HEADER: u64 = 12;
const DESC_BODY: u64 = 32;
/// Data chunk header plus the edit count.
const DATA_HEADER: u64 = CHUNK_HEADER + 4;
const HEADER_SIZE: u64 = FILE_HEADER + CHUNK_HEADER + DESC_BODY + DATA_HEADER;
const DATA_SIZE_OFFSET: u64 = FILE_HEADER + CHUNK_HEADER + DESC_BODY + 4;

const UNKNOWN_SIZE: i64 = -1;

const FLAG_FLOAT: u32 = 1;
const FLAG_LITTLE_ENDIAN: u32 = 2;

/// Contents of the `desc` chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDescription {
    pub sample_rate: f64,
    pub format_id: [u8; 4],
    pub flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub channels: u32,
    pub bits: u32,
}

impl AudioDescription {
    fn for_info(info: &SoundFileInfo) -> Self {
        let mut flags = 0;
        if info.format().is_float() {
            flags |= FLAG_FLOAT;
        }
        if info.endianness == Endianness::Little {
            flags |= FLAG_LITTLE_ENDIAN;
        }
        Self {
            sample_rate: info.sample_rate as f64,
            format_id: *b"lpcm",
            flags,
            bytes_per_packet: info.bytes_per_frame() as u32,
            frames_per_packet: 1,
            channels: info.channels() as u32,
            bits: info.format().bits() as u32,
        }
    }

    fn parse(body: &mut FieldCursor<'_>) -> Result<Self> {
        Ok(Self {
            sample_rate: body.f64()?,
            format_id: body.tag()?,
            flags: body.u32()?,
            bytes_per_packet: body.u32()?,
            frames_per_packet: body.u32()?,
            channels: body.u32()?,
            bits: body.u32()?,
        })
    }

    fn sample_format(&self) -> Result<(SampleFormat, Endianness)> {
        if &self.format_id != b"lpcm" {
            return Err(Error::unsupported(format!(
                "CAF format '{}'",
                String::from_utf8_lossy(&self.format_id)
            )));
        }
        let float = self.flags & FLAG_FLOAT != 0;
        let endianness = if self.flags & FLAG_LITTLE_ENDIAN != 0 {
            Endianness::Little
        } else {
            Endianness::Big
        };
        let format = match (float, self.bits) {
            (false, 16) => SampleFormat::Int16,
            (false, 24) => SampleFormat::Int24,
            (true, 32) => SampleFormat::Float32,
            (false, 32) => return Err(Error::unsupported("32-bit integer samples")),
            (_, bits) => return Err(Error::unsupported(format!("{bits}-bit samples"))),
        };
        Ok((format, endianness))
    }
}

fn data_chunk_size(info: &SoundFileInfo, frames: u64) -> i64 {
    let bytes = frames.saturating_mul(info.bytes_per_frame() as u64);
    (bytes.min(i64::MAX as u64 - 4) + 4) as i64
}

#[derive(Debug)]
pub struct CafFormat;

pub(crate) static CAF: CafFormat = CafFormat;

impl FileTypeDescriptor for CafFormat {
    fn name(&self) -> &'static str {
        "caf"
    }

    fn min_header_size(&self) -> usize {
        HEADER_SIZE as usize
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["caf"]
    }

    fn detect(&self, probe: &[u8]) -> bool {
        probe.len() >= 4 && &probe[..4] == b"caff"
    }

    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo> {
        let mut r = ChunkReader::new(file, Endianness::Big)?;
        let mut head = r.fields(FILE_HEADER as usize)?;
        if &head.tag()? != b"caff" {
            return Err(Error::malformed("not a CAF file"));
        }
        let version = head.u16()?;
        let flags = head.u16()?;
        if version != 1 || flags != 0 {
            return Err(Error::UnsupportedVersion(format!(
                "CAF version {version}, flags {flags:#x}"
            )));
        }

        let desc = match r.next_chunk(SizeField::I64)? {
            Some(chunk) if &chunk.id == b"desc" => {
                if chunk.size != DESC_BODY as i64 {
                    return Err(Error::malformed(format!("desc chunk size {}", chunk.size)));
                }
                AudioDescription::parse(&mut r.fields(DESC_BODY as usize)?)?
            }
            _ => return Err(Error::malformed("first CAF chunk is not 'desc'")),
        };
        let (format, endianness) = desc.sample_format()?;
        if desc.channels == 0 || desc.channels as usize > MAX_CHANNELS {
            return Err(Error::malformed(format!("{} channels", desc.channels)));
        }

        loop {
            let Some(chunk) = r.next_chunk(SizeField::I64)? else {
                return Err(Error::malformed("no data chunk"));
            };
            if &chunk.id != b"data" {
                r.skip_body(&chunk, SizeField::I64)?;
                continue;
            }
            if chunk.size != UNKNOWN_SIZE && chunk.size < 4 {
                return Err(Error::malformed("data chunk too short"));
            }
            let _edit_count = r.fields(4)?.u32()?;

            let mut info = SoundFileInfo::new(
                desc.sample_rate.round() as u32,
                desc.channels as usize,
                format,
                endianness,
            );
            info.header_size = Some(r.position());
            info.byte_limit = if chunk.size == UNKNOWN_SIZE {
                r.remaining()
            } else {
                chunk.size as u64 - 4
            };
            return Ok(info);
        }
    }

    fn write_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<u64> {
        let desc = AudioDescription::for_info(info);
        let data = if frames == 0 {
            UNKNOWN_SIZE
        } else {
            data_chunk_size(info, frames)
        };

        let mut w = FieldWriter::new(Endianness::Big);
        w.bytes(b"caff").u16(1).u16(0);
        w.bytes(b"desc")
            .i64(DESC_BODY as i64)
            .f64(desc.sample_rate)
            .bytes(&desc.format_id)
            .u32(desc.flags)
            .u32(desc.bytes_per_packet)
            .u32(desc.frames_per_packet)
            .u32(desc.channels)
            .u32(desc.bits);
        w.bytes(b"data").i64(data).u32(0);
        debug_assert_eq!(w.len() as u64, HEADER_SIZE);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&w.into_inner())?;
        Ok(HEADER_SIZE)
    }

    fn update_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<()> {
        let resume = file.stream_position()?;
        file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        file.write_all(&data_chunk_size(info, frames).to_be_bytes())?;
        file.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    fn endianness(&self, requested: Option<Endianness>, _format: SampleFormat) -> Endianness {
        requested.unwrap_or(Endianness::Big)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let info = SoundFileInfo::new(44100, 2, SampleFormat::Int24, Endianness::Little);
        let mut file = Cursor::new(Vec::new());
        assert_eq!(CAF.write_header(&mut file, &info, 0).unwrap(), 68);

        let bytes = file.into_inner();
        assert_eq!(&bytes[..4], b"caff");
        assert_eq!(&bytes[8..12], b"desc");
        assert_eq!(f64::from_be_bytes(bytes[20..28].try_into().unwrap()), 44100.0);
        assert_eq!(&bytes[28..32], b"lpcm");
        assert_eq!(u32::from_be_bytes(bytes[32..36].try_into().unwrap()), FLAG_LITTLE_ENDIAN);
        assert_eq!(&bytes[52..56], b"data");
        assert_eq!(i64::from_be_bytes(bytes[56..64].try_into().unwrap()), -1);
    }

    #[test]
    fn test_unknown_size_reads_to_end() {
        let info = SoundFileInfo::new(8000, 1, SampleFormat::Float32, Endianness::Big);
        let mut file = Cursor::new(Vec::new());
        CAF.write_header(&mut file, &info, 0).unwrap();
        file.write_all(&[0; 12]).unwrap();

        let read = CAF.read_header(&mut file).unwrap();
        assert_eq!(read.format(), SampleFormat::Float32);
        assert_eq!(read.byte_limit, 12);

        CAF.update_header(&mut file, &info, 2).unwrap();
        let read = CAF.read_header(&mut file).unwrap();
        assert_eq!(read.byte_limit, 8);
    }

    #[test]
    fn test_rejects_other_versions() {
        let mut w = FieldWriter::new(Endianness::Big);
        w.bytes(b"caff").u16(2).u16(0).bytes(&[0; 60]);
        let err = CAF.read_header(&mut Cursor::new(w.into_inner())).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(_)));
    }

    #[test]
    fn test_rejects_non_lpcm() {
        let info = SoundFileInfo::new(8000, 1, SampleFormat::Int16, Endianness::Big);
        let mut file = Cursor::new(Vec::new());
        CAF.write_header(&mut file, &info, 0).unwrap();
        file.get_mut()[28..32].copy_from_slice(b"aac ");
        let err = CAF.read_header(&mut file).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSampleFormat(_)));
    }

    #[test]
    fn test_desc_must_come_first() {
        let mut w = FieldWriter::new(Endianness::Big);
        w.bytes(b"caff").u16(1).u16(0);
        w.bytes(b"free").i64(0).bytes(&[0; 56]);
        let err = CAF.read_header(&mut Cursor::new(w.into_inner())).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }
}
