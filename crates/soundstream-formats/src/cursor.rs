//! Position-tracking readers and a field writer for header parsing.
//!
//! [`ChunkReader`] walks a file and [`FieldCursor`] walks one chunk body.
//! Both check every read against the bytes actually available and fail with
//! `MalformedHeader` instead of trusting declared sizes.

use std::io::{Read, Seek, SeekFrom};

use soundstream_core::{Endianness, Error, Result};

use crate::extended;
use crate::registry::ReadSeek;

/// Width of a chunk's size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizeField {
    /// 32-bit size, body padded to an even length (RIFF, IFF).
    U32Padded,
    /// Signed 64-bit size, no padding (CAF).
    I64,
}

/// Header of one chunk as found in the file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk {
    pub id: [u8; 4],
    /// Declared body size. `-1` for CAF's "rest of file" sentinel.
    pub size: i64,
}

impl Chunk {
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

/// Sequential reader over a whole file that knows the file length.
pub(crate) struct ChunkReader<'a> {
    file: &'a mut dyn ReadSeek,
    pos: u64,
    len: u64,
    order: Endianness,
}

impl<'a> ChunkReader<'a> {
    /// Rewind `file` and measure it.
    pub fn new(file: &'a mut dyn ReadSeek, order: Endianness) -> Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            file,
            pos: 0,
            len,
            order,
        })
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if (n as u64) > self.remaining() {
            return Err(Error::malformed(format!(
                "truncated: wanted {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let mut buf = vec![0u8; n];
        self.file.read_exact(&mut buf)?;
        self.pos += n as u64;
        Ok(buf)
    }

    /// Read `n` bytes and hand them out as a field cursor.
    pub fn fields(&mut self, n: usize) -> Result<FieldCursor<'static>> {
        let bytes = self.read_bytes(n)?;
        Ok(FieldCursor::owned(bytes, self.order))
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::malformed(format!(
                "chunk overruns file: {n} bytes at offset {}",
                self.pos
            )));
        }
        self.pos += n;
        self.file.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    /// Next chunk header, or `None` when too few bytes remain for one.
    pub fn next_chunk(&mut self, size: SizeField) -> Result<Option<Chunk>> {
        let header_len = match size {
            SizeField::U32Padded => 8,
            SizeField::I64 => 12,
        };
        if self.remaining() < header_len {
            return Ok(None);
        }
        let mut f = self.fields(header_len as usize)?;
        let id = f.tag()?;
        let size = match size {
            SizeField::U32Padded => f.u32()? as i64,
            SizeField::I64 => f.i64()?,
        };
        tracing::trace!(chunk = %String::from_utf8_lossy(&id), size, offset = self.pos, "chunk");
        Ok(Some(Chunk { id, size }))
    }

    /// Skip a chunk body plus its pad byte.
    pub fn skip_body(&mut self, chunk: &Chunk, size: SizeField) -> Result<()> {
        if chunk.size < 0 {
            return Err(Error::malformed(format!(
                "negative size for chunk '{}'",
                chunk.id_str()
            )));
        }
        let mut n = chunk.size as u64;
        // A missing trailing pad byte is tolerated.
        if size == SizeField::U32Padded && n & 1 == 1 && self.remaining() > n {
            n += 1;
        }
        self.skip(n)
    }
}

/// Cursor over an in-memory chunk body.
#[derive(Debug)]
pub struct FieldCursor<'a> {
    bytes: std::borrow::Cow<'a, [u8]>,
    pos: usize,
    order: Endianness,
}

impl<'a> FieldCursor<'a> {
    pub fn new(bytes: &'a [u8], order: Endianness) -> Self {
        Self {
            bytes: std::borrow::Cow::Borrowed(bytes),
            pos: 0,
            order,
        }
    }

    fn owned(bytes: Vec<u8>, order: Endianness) -> FieldCursor<'static> {
        FieldCursor {
            bytes: std::borrow::Cow::Owned(bytes),
            pos: 0,
            order,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(Error::malformed(format!(
                "field overruns chunk: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.bytes[start..self.pos])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn tag(&mut self) -> Result<[u8; 4]> {
        self.array()
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.array()?;
        Ok(match self.order {
            Endianness::Big => u16::from_be_bytes(b),
            Endianness::Little => u16::from_le_bytes(b),
        })
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.array()?;
        Ok(match self.order {
            Endianness::Big => u32::from_be_bytes(b),
            Endianness::Little => u32::from_le_bytes(b),
        })
    }

    pub fn i64(&mut self) -> Result<i64> {
        let b = self.array()?;
        Ok(match self.order {
            Endianness::Big => i64::from_be_bytes(b),
            Endianness::Little => i64::from_le_bytes(b),
        })
    }

    pub fn f64(&mut self) -> Result<f64> {
        let b = self.array()?;
        Ok(match self.order {
            Endianness::Big => f64::from_be_bytes(b),
            Endianness::Little => f64::from_le_bytes(b),
        })
    }

    /// 80-bit IEEE extended float, always stored big-endian.
    pub fn extended(&mut self) -> Result<f64> {
        let b = self.array::<10>()?;
        extended::decode(&b)
    }

    /// Pascal string: count byte, characters, pad to an even total.
    pub fn pstring(&mut self) -> Result<String> {
        let len = self.take(1)?[0] as usize;
        let text = String::from_utf8_lossy(self.take(len)?).into_owned();
        if (len + 1) % 2 == 1 && self.remaining() > 0 {
            self.skip(1)?;
        }
        Ok(text)
    }
}

/// Builds a header in memory in one byte order.
#[derive(Debug)]
pub struct FieldWriter {
    buf: Vec<u8>,
    order: Endianness,
}

impl FieldWriter {
    pub fn new(order: Endianness) -> Self {
        Self {
            buf: Vec::with_capacity(128),
            order,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        match self.order {
            Endianness::Big => self.bytes(&v.to_be_bytes()),
            Endianness::Little => self.bytes(&v.to_le_bytes()),
        }
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        match self.order {
            Endianness::Big => self.bytes(&v.to_be_bytes()),
            Endianness::Little => self.bytes(&v.to_le_bytes()),
        }
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        match self.order {
            Endianness::Big => self.bytes(&v.to_be_bytes()),
            Endianness::Little => self.bytes(&v.to_le_bytes()),
        }
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        match self.order {
            Endianness::Big => self.bytes(&v.to_be_bytes()),
            Endianness::Little => self.bytes(&v.to_le_bytes()),
        }
    }

    pub fn extended(&mut self, v: f64) -> &mut Self {
        self.bytes(&extended::encode(v))
    }

    pub fn pstring(&mut self, text: &str) -> &mut Self {
        let text = &text.as_bytes()[..text.len().min(255)];
        self.bytes(&[text.len() as u8]).bytes(text);
        if (text.len() + 1) % 2 == 1 {
            self.bytes(&[0]);
        }
        self
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Encode a single length field in `order`.
pub(crate) fn u32_bytes(v: u32, order: Endianness) -> [u8; 4] {
    match order {
        Endianness::Big => v.to_be_bytes(),
        Endianness::Little => v.to_le_bytes(),
    }
}
