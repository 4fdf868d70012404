//! AIFF and AIFF-C.
//!
//! Big-endian IFF chunks. Plain AIFF carries big-endian integer samples only.
//! AIFF-C adds a compression id to `COMM`: `NONE` (big-endian integers),
//! `sowt` (little-endian integers) and `fl32` (big-endian float). AIFF-C is
//! written whenever one of the latter two is needed.

use std::io::{Seek, SeekFrom, Write};

use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo, MAX_CHANNELS};

use crate::cursor::{u32_bytes, ChunkReader, FieldCursor, FieldWriter, SizeField};
use crate::registry::{FileTypeDescriptor, ReadSeek, WriteSeek};

/// Timestamp of the only AIFF-C revision.
const AIFC_VERSION_1: u32 = 0xa280_5140;

const FORM_HEADER: u64 = 12;
const FVER_CHUNK: u64 = 12;
const COMM_BODY: u64 = 18;
/// SSND chunk header plus its offset and block size fields.
const SSND_HEADER: u64 = 16;

/// AIFF-C compression types this module reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Big-endian integers.
    None,
    /// Little-endian integers.
    Sowt,
    /// Big-endian 32-bit float.
    Fl32,
}

impl Compression {
    fn from_id(id: &[u8; 4]) -> Option<Self> {
        match id {
            b"NONE" | b"twos" => Some(Self::None),
            b"sowt" => Some(Self::Sowt),
            b"fl32" | b"FL32" => Some(Self::Fl32),
            _ => None,
        }
    }

    fn id(self) -> &'static [u8; 4] {
        match self {
            Self::None => b"NONE",
            Self::Sowt => b"sowt",
            Self::Fl32 => b"fl32",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::None => "not compressed",
            Self::Sowt => "little endian",
            Self::Fl32 => "32-bit float",
        }
    }

    fn for_info(info: &SoundFileInfo) -> Self {
        if info.format().is_float() {
            Self::Fl32
        } else if info.endianness == Endianness::Little {
            Self::Sowt
        } else {
            Self::None
        }
    }

    fn name_len(self) -> u64 {
        let n = self.label().len() as u64 + 1;
        n + (n & 1)
    }
}

/// Contents of a `COMM` chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonChunk {
    pub channels: u16,
    pub frames: u32,
    pub bits: u16,
    pub sample_rate: f64,
    /// `Some` for AIFF-C.
    pub compression: Option<Compression>,
}

impl CommonChunk {
    fn parse(body: &mut FieldCursor<'_>, aifc: bool) -> Result<Self> {
        let channels = body.u16()?;
        let frames = body.u32()?;
        let bits = body.u16()?;
        let sample_rate = body.extended()?;
        let compression = if aifc {
            let id = body.tag()?;
            let compression = Compression::from_id(&id).ok_or_else(|| {
                Error::unsupported(format!(
                    "AIFF-C compression '{}'",
                    String::from_utf8_lossy(&id)
                ))
            })?;
            Some(compression)
        } else {
            None
        };
        Ok(Self {
            channels,
            frames,
            bits,
            sample_rate,
            compression,
        })
    }

    fn sample_format(&self) -> Result<(SampleFormat, Endianness)> {
        match (self.compression, self.bits) {
            (None | Some(Compression::None), 16) => Ok((SampleFormat::Int16, Endianness::Big)),
            (None | Some(Compression::None), 24) => Ok((SampleFormat::Int24, Endianness::Big)),
            (Some(Compression::Sowt), 16) => Ok((SampleFormat::Int16, Endianness::Little)),
            (Some(Compression::Sowt), 24) => Ok((SampleFormat::Int24, Endianness::Little)),
            (Some(Compression::Fl32), 32) => Ok((SampleFormat::Float32, Endianness::Big)),
            (Some(Compression::Fl32), bits) => {
                Err(Error::unsupported(format!("{bits}-bit float")))
            }
            (_, 32) => Err(Error::unsupported("32-bit integer samples")),
            (_, bits) => Err(Error::unsupported(format!("{bits}-bit samples"))),
        }
    }
}

/// Byte offsets of the length fields in a header this module wrote.
#[derive(Debug, Clone, Copy)]
struct Layout {
    compression: Option<Compression>,
}

impl Layout {
    fn for_info(info: &SoundFileInfo) -> Self {
        let compression = Compression::for_info(info);
        Self {
            compression: (compression != Compression::None).then_some(compression),
        }
    }

    fn comm_offset(self) -> u64 {
        FORM_HEADER + if self.compression.is_some() { FVER_CHUNK } else { 0 }
    }

    fn comm_body(self) -> u64 {
        COMM_BODY + self.compression.map_or(0, |c| 4 + c.name_len())
    }

    fn frames_offset(self) -> u64 {
        self.comm_offset() + 8 + 2
    }

    fn ssnd_size_offset(self) -> u64 {
        self.comm_offset() + 8 + self.comm_body() + 4
    }

    fn header_size(self) -> u64 {
        self.comm_offset() + 8 + self.comm_body() + SSND_HEADER
    }
}

fn data_size(info: &SoundFileInfo, frames: u64) -> u32 {
    let limit = (u32::MAX - 1024) as u64;
    frames.saturating_mul(info.bytes_per_frame() as u64).min(limit) as u32
}

#[derive(Debug)]
pub struct AiffFormat;

pub(crate) static AIFF: AiffFormat = AiffFormat;

impl FileTypeDescriptor for AiffFormat {
    fn name(&self) -> &'static str {
        "aiff"
    }

    fn min_header_size(&self) -> usize {
        (FORM_HEADER + 8 + COMM_BODY + SSND_HEADER) as usize
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["aif", "aiff", "aifc"]
    }

    fn detect(&self, probe: &[u8]) -> bool {
        probe.len() >= 12
            && &probe[..4] == b"FORM"
            && matches!(&probe[8..12], b"AIFF" | b"AIFC")
    }

    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo> {
        let mut r = ChunkReader::new(file, Endianness::Big)?;
        let mut form = r.fields(FORM_HEADER as usize)?;
        let outer = form.tag()?;
        form.skip(4)?;
        let aifc = match &form.tag()? {
            b"AIFF" if &outer == b"FORM" => false,
            b"AIFC" if &outer == b"FORM" => true,
            _ => return Err(Error::malformed("not an AIFF file")),
        };

        let mut comm: Option<CommonChunk> = None;
        loop {
            let Some(chunk) = r.next_chunk(SizeField::U32Padded)? else {
                return Err(Error::malformed("no SSND chunk"));
            };
            match &chunk.id {
                b"COMM" => {
                    let min = if aifc { COMM_BODY + 4 } else { COMM_BODY };
                    if (chunk.size as u64) < min {
                        return Err(Error::malformed("COMM chunk too short"));
                    }
                    let mut body = r.fields(chunk.size as usize)?;
                    comm = Some(CommonChunk::parse(&mut body, aifc)?);
                    if chunk.size & 1 == 1 && r.remaining() > 0 {
                        r.skip(1)?;
                    }
                }
                b"SSND" => {
                    let comm = comm.ok_or_else(|| Error::malformed("SSND chunk before COMM chunk"))?;
                    let (format, endianness) = comm.sample_format()?;
                    if comm.channels == 0 || comm.channels as usize > MAX_CHANNELS {
                        return Err(Error::malformed(format!("{} channels", comm.channels)));
                    }
                    if chunk.size < 8 {
                        return Err(Error::malformed("SSND chunk too short"));
                    }
                    let mut ssnd = r.fields(8)?;
                    let offset = ssnd.u32()? as u64;
                    let _block_size = ssnd.u32()?;
                    r.skip(offset)?;

                    let mut info = SoundFileInfo::new(
                        comm.sample_rate.round() as u32,
                        comm.channels as usize,
                        format,
                        endianness,
                    );
                    info.header_size = Some(r.position());
                    info.byte_limit = (chunk.size as u64 - 8).saturating_sub(offset);
                    return Ok(info);
                }
                _ => r.skip_body(&chunk, SizeField::U32Padded)?,
            }
        }
    }

    fn write_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<u64> {
        let layout = Layout::for_info(info);
        let data = data_size(info, frames);
        let header = layout.header_size();

        let mut w = FieldWriter::new(Endianness::Big);
        w.bytes(b"FORM")
            .u32((header - 8 + data as u64 + (data as u64 & 1)) as u32)
            .bytes(if layout.compression.is_some() { b"AIFC" } else { b"AIFF" });
        if layout.compression.is_some() {
            w.bytes(b"FVER").u32(4).u32(AIFC_VERSION_1);
        }
        w.bytes(b"COMM")
            .u32(layout.comm_body() as u32)
            .u16(info.channels() as u16)
            .u32(frames.min(u32::MAX as u64) as u32)
            .u16(info.format().bits())
            .extended(info.sample_rate as f64);
        if let Some(c) = layout.compression {
            w.bytes(c.id()).pstring(c.label());
        }
        w.bytes(b"SSND").u32(data + 8).u32(0).u32(0);
        debug_assert_eq!(w.len() as u64, header);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&w.into_inner())?;
        Ok(header)
    }

    fn update_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<()> {
        let layout = Layout::for_info(info);
        let data = data_size(info, frames);
        let be = Endianness::Big;
        let resume = file.stream_position()?;

        file.seek(SeekFrom::Start(layout.frames_offset()))?;
        file.write_all(&u32_bytes(frames.min(u32::MAX as u64) as u32, be))?;
        file.seek(SeekFrom::Start(layout.ssnd_size_offset()))?;
        file.write_all(&u32_bytes(data + 8, be))?;
        if data & 1 == 1 {
            file.seek(SeekFrom::Start(layout.header_size() + data as u64))?;
            file.write_all(&[0])?;
        }
        let form = layout.header_size() - 8 + data as u64 + (data as u64 & 1);
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&u32_bytes(form as u32, be))?;

        file.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    /// Big-endian unless little is asked for explicitly. Float is always big.
    fn endianness(&self, requested: Option<Endianness>, format: SampleFormat) -> Endianness {
        match requested {
            Some(Endianness::Little) if !format.is_float() => Endianness::Little,
            _ => Endianness::Big,
        }
    }
}
