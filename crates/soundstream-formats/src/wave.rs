//! RIFF/WAVE.
//!
//! Little-endian chunks, word aligned. 32-bit float is written as
//! `WAVE_FORMAT_EXTENSIBLE` with a `fact` chunk; everything else uses a plain
//! 16-byte `fmt ` body.

use std::io::{Seek, SeekFrom, Write};

use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo, MAX_CHANNELS};

use crate::cursor::{u32_bytes, ChunkReader, FieldCursor, FieldWriter, SizeField};
use crate::registry::{FileTypeDescriptor, ReadSeek, WriteSeek};

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Tail of the KSDATAFORMAT_SUBTYPE GUID; the first two bytes carry the tag.
const SUBTYPE_GUID_TAIL: [u8; 14] = [
    0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

const RIFF_HEADER: u64 = 12;
const FMT_CHUNK: u64 = 8 + 16;
const FMT_EXTENSION: u64 = 24;
const FACT_CHUNK: u64 = 12;
const DATA_CHUNK_HEADER: u64 = 8;

/// Data size meaning "up to the end of the file".
const UNKNOWN_SIZE: u32 = u32::MAX;

/// Contents of a `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormatChunk {
    /// Effective tag: the subformat tag for extensible files.
    pub tag: u16,
    pub extensible: bool,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits: u16,
}

impl WaveFormatChunk {
    fn for_info(info: &SoundFileInfo) -> Self {
        let format = info.format();
        Self {
            tag: if format.is_float() { FORMAT_FLOAT } else { FORMAT_PCM },
            extensible: format.is_float(),
            channels: info.channels() as u16,
            sample_rate: info.sample_rate,
            byte_rate: info.sample_rate * info.bytes_per_frame() as u32,
            block_align: info.bytes_per_frame() as u16,
            bits: format.bits(),
        }
    }

    fn parse(body: &mut FieldCursor<'_>) -> Result<Self> {
        let mut tag = body.u16()?;
        let channels = body.u16()?;
        let sample_rate = body.u32()?;
        let byte_rate = body.u32()?;
        let block_align = body.u16()?;
        let bits = body.u16()?;
        let extensible = tag == FORMAT_EXTENSIBLE;
        if extensible {
            if body.remaining() < FMT_EXTENSION as usize {
                return Err(Error::unsupported("short extensible format chunk"));
            }
            let _ext_size = body.u16()?;
            let _valid_bits = body.u16()?;
            let _channel_mask = body.u32()?;
            tag = body.u16()?;
            body.skip(SUBTYPE_GUID_TAIL.len())?;
        }
        Ok(Self {
            tag,
            extensible,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits,
        })
    }

    fn sample_format(&self) -> Result<SampleFormat> {
        match (self.tag, self.bits) {
            (FORMAT_PCM, 16) => Ok(SampleFormat::Int16),
            (FORMAT_PCM, 24) => Ok(SampleFormat::Int24),
            (FORMAT_FLOAT, 32) => Ok(SampleFormat::Float32),
            (FORMAT_PCM, 32) => Err(Error::unsupported("32-bit integer PCM")),
            (FORMAT_PCM | FORMAT_FLOAT, bits) => {
                Err(Error::unsupported(format!("{bits}-bit samples")))
            }
            (tag, _) => Err(Error::unsupported(format!("format tag {tag:#06x}"))),
        }
    }

    fn write(&self, w: &mut FieldWriter) {
        let body = if self.extensible { 16 + FMT_EXTENSION } else { 16 };
        w.bytes(b"fmt ")
            .u32(body as u32)
            .u16(if self.extensible { FORMAT_EXTENSIBLE } else { self.tag })
            .u16(self.channels)
            .u32(self.sample_rate)
            .u32(self.byte_rate)
            .u16(self.block_align)
            .u16(self.bits);
        if self.extensible {
            w.u16(22)
                .u16(self.bits)
                .u32(0)
                .u16(self.tag)
                .bytes(&SUBTYPE_GUID_TAIL);
        }
    }
}

/// Byte offsets of the length fields in a header this module wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    extensible: bool,
}

impl Layout {
    fn for_info(info: &SoundFileInfo) -> Self {
        Self {
            extensible: info.format().is_float(),
        }
    }

    fn header_size(self) -> u64 {
        let ext = if self.extensible {
            FMT_EXTENSION + FACT_CHUNK
        } else {
            0
        };
        RIFF_HEADER + FMT_CHUNK + ext + DATA_CHUNK_HEADER
    }

    fn fact_length_offset(self) -> Option<u64> {
        self.extensible
            .then_some(RIFF_HEADER + FMT_CHUNK + FMT_EXTENSION + 8)
    }

    fn data_size_offset(self) -> u64 {
        self.header_size() - 4
    }
}

fn data_size(info: &SoundFileInfo, frames: u64) -> u32 {
    let bytes = frames.saturating_mul(info.bytes_per_frame() as u64);
    bytes.min(UNKNOWN_SIZE as u64 - 1) as u32
}

fn riff_size(layout: Layout, data: u32) -> u32 {
    let total = layout.header_size() - 8 + data as u64 + (data as u64 & 1);
    total.min(u32::MAX as u64) as u32
}

#[derive(Debug)]
pub struct WaveFormat;

pub(crate) static WAVE: WaveFormat = WaveFormat;

impl FileTypeDescriptor for WaveFormat {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn min_header_size(&self) -> usize {
        (RIFF_HEADER + FMT_CHUNK + DATA_CHUNK_HEADER) as usize
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav", "wave"]
    }

    fn detect(&self, probe: &[u8]) -> bool {
        probe.len() >= 12 && &probe[..4] == b"RIFF" && &probe[8..12] == b"WAVE"
    }

    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo> {
        let mut r = ChunkReader::new(file, Endianness::Little)?;
        let mut riff = r.fields(RIFF_HEADER as usize)?;
        let outer = riff.tag()?;
        riff.skip(4)?;
        if &outer != b"RIFF" || &riff.tag()? != b"WAVE" {
            return Err(Error::malformed("not a RIFF/WAVE file"));
        }

        let mut fmt: Option<WaveFormatChunk> = None;
        loop {
            let Some(chunk) = r.next_chunk(SizeField::U32Padded)? else {
                return Err(Error::malformed("no data chunk"));
            };
            match &chunk.id {
                b"fmt " => {
                    if chunk.size < 16 {
                        return Err(Error::malformed("format chunk too short"));
                    }
                    let mut body = r.fields(chunk.size as usize)?;
                    fmt = Some(WaveFormatChunk::parse(&mut body)?);
                    if chunk.size & 1 == 1 && r.remaining() > 0 {
                        r.skip(1)?;
                    }
                }
                b"data" => {
                    let fmt = fmt.ok_or_else(|| Error::malformed("data chunk before format chunk"))?;
                    let format = fmt.sample_format()?;
                    if fmt.channels == 0 || fmt.channels as usize > MAX_CHANNELS {
                        return Err(Error::malformed(format!("{} channels", fmt.channels)));
                    }
                    let mut info = SoundFileInfo::new(
                        fmt.sample_rate,
                        fmt.channels as usize,
                        format,
                        Endianness::Little,
                    );
                    info.header_size = Some(r.position());
                    info.byte_limit = if chunk.size as u32 == UNKNOWN_SIZE {
                        r.remaining()
                    } else {
                        chunk.size as u64
                    };
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

        let mut w = FieldWriter::new(Endianness::Little);
        w.bytes(b"RIFF").u32(riff_size(layout, data)).bytes(b"WAVE");
        WaveFormatChunk::for_info(info).write(&mut w);
        if layout.extensible {
            w.bytes(b"fact").u32(4).u32(frames.min(u32::MAX as u64) as u32);
        }
        w.bytes(b"data").u32(data);
        debug_assert_eq!(w.len() as u64, layout.header_size());

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&w.into_inner())?;
        Ok(layout.header_size())
    }

    fn update_header(
        &self,
        file: &mut dyn WriteSeek,
        info: &SoundFileInfo,
        frames: u64,
    ) -> Result<()> {
        let layout = Layout::for_info(info);
        let data = data_size(info, frames);
        let le = Endianness::Little;
        let resume = file.stream_position()?;

        if let Some(at) = layout.fact_length_offset() {
            file.seek(SeekFrom::Start(at))?;
            file.write_all(&u32_bytes(frames.min(u32::MAX as u64) as u32, le))?;
        }
        file.seek(SeekFrom::Start(layout.data_size_offset()))?;
        file.write_all(&u32_bytes(data, le))?;
        if data & 1 == 1 {
            file.seek(SeekFrom::Start(layout.header_size() + data as u64))?;
            file.write_all(&[0])?;
        }
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&u32_bytes(riff_size(layout, data), le))?;

        file.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    fn endianness(&self, _requested: Option<Endianness>, _format: SampleFormat) -> Endianness {
        Endianness::Little
    }
}
