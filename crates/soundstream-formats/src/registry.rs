//! File type descriptors and the process-wide registry.

use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo};

use crate::{aiff, caf, next, raw, wave};

/// Readable, seekable file handle.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Writable, seekable file handle.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// One container format.
///
/// Descriptors are stateless and registered once; every operation takes the
/// file handle it works on.
pub trait FileTypeDescriptor: Send + Sync + fmt::Debug {
    /// Short lowercase name (`"wave"`, `"aiff"`, ...).
    fn name(&self) -> &'static str;

    /// Probe bytes needed by [`detect`](Self::detect).
    fn min_header_size(&self) -> usize;

    /// Accepted filename suffixes, the first one being the default.
    fn extensions(&self) -> &'static [&'static str];

    /// Whether `probe` starts with this format's magic.
    fn detect(&self, probe: &[u8]) -> bool;

    /// Parse the header from the start of `file`.
    fn read_header(&self, file: &mut dyn ReadSeek) -> Result<SoundFileInfo>;

    /// Write a complete header at the start of `file` with length fields
    /// sized for `frames`, leaving the file positioned at the first sample.
    /// Returns the header size in bytes.
    fn write_header(&self, file: &mut dyn WriteSeek, info: &SoundFileInfo, frames: u64)
        -> Result<u64>;

    /// Rewrite the length fields for `frames` frames. Leaves every other
    /// header byte and the file position untouched.
    fn update_header(&self, file: &mut dyn WriteSeek, info: &SoundFileInfo, frames: u64)
        -> Result<()>;

    /// Byte order actually used for a write request.
    fn endianness(&self, requested: Option<Endianness>, format: SampleFormat) -> Endianness;

    /// Case-insensitive suffix test.
    fn has_extension(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.extensions().iter().any(|ext| {
            lower.len() > ext.len()
                && lower.ends_with(ext)
                && lower.as_bytes()[lower.len() - ext.len() - 1] == b'.'
        })
    }

    /// Append the default suffix unless the name already carries one.
    fn add_extension(&self, filename: &str) -> String {
        match self.extensions().first() {
            Some(ext) if !self.has_extension(filename) => format!("{filename}.{ext}"),
            _ => filename.to_string(),
        }
    }
}

/// Descriptor chosen for a write plus the resolved byte order and path.
#[derive(Debug, Clone)]
pub struct WriteTarget {
    pub descriptor: &'static dyn FileTypeDescriptor,
    pub endianness: Endianness,
    pub path: PathBuf,
}

/// Ordered list of descriptors. Detection tries them in registration order.
#[derive(Debug)]
pub struct SoundFileRegistry {
    types: Vec<&'static dyn FileTypeDescriptor>,
}

impl Default for SoundFileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundFileRegistry {
    /// WAVE, AIFF, CAF, NeXT in that order.
    pub fn new() -> Self {
        Self {
            types: vec![&wave::WAVE, &aiff::AIFF, &caf::CAF, &next::NEXT],
        }
    }

    /// Registry without any formats.
    pub fn empty() -> Self {
        Self { types: Vec::new() }
    }

    /// Shared registry with the built-in formats.
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<SoundFileRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::new)
    }

    /// Append a descriptor. Built-ins keep detection priority.
    pub fn register(&mut self, descriptor: &'static dyn FileTypeDescriptor) {
        self.types.push(descriptor);
    }

    pub fn types(&self) -> impl Iterator<Item = &'static dyn FileTypeDescriptor> + '_ {
        self.types.iter().copied()
    }

    /// The headerless descriptor. Never returned by detection.
    pub fn raw(&self) -> &'static dyn FileTypeDescriptor {
        &raw::RAW
    }

    /// Probe buffer size large enough for every registered format.
    pub fn probe_size(&self) -> usize {
        self.types
            .iter()
            .map(|t| t.min_header_size())
            .max()
            .unwrap_or(0)
    }

    pub fn detect(&self, probe: &[u8]) -> Option<&'static dyn FileTypeDescriptor> {
        let found = self.types.iter().copied().find(|t| t.detect(probe));
        if let Some(t) = found {
            tracing::trace!(format = t.name(), "detected");
        }
        found
    }

    /// Look up by name. Accepts a few common aliases.
    pub fn by_name(&self, name: &str) -> Option<&'static dyn FileTypeDescriptor> {
        let name = name.to_ascii_lowercase();
        let canonical = match name.as_str() {
            "wav" => "wave",
            "aif" | "aifc" | "aiff-c" => "aiff",
            "nextstep" | "au" | "snd" => "next",
            other => other,
        };
        if canonical == "raw" {
            return Some(self.raw());
        }
        self.types.iter().copied().find(|t| t.name() == canonical)
    }

    pub fn by_extension(&self, filename: &str) -> Option<&'static dyn FileTypeDescriptor> {
        self.types.iter().copied().find(|t| t.has_extension(filename))
    }

    /// Pick the descriptor, byte order and final path for a new file.
    ///
    /// An explicit `file_type` wins, then the path's suffix, then WAVE. The
    /// default suffix is appended when the path lacks one of the type's.
    pub fn resolve_write(
        &self,
        path: &Path,
        file_type: Option<&str>,
        requested: Option<Endianness>,
        format: SampleFormat,
    ) -> Result<WriteTarget> {
        let filename = path.to_string_lossy();
        let descriptor = match file_type {
            Some(name) => self
                .by_name(name)
                .ok_or_else(|| Error::UnknownFileType(name.to_string()))?,
            None => self.by_extension(&filename).unwrap_or(&wave::WAVE),
        };
        let path = PathBuf::from(descriptor.add_extension(&filename));
        Ok(WriteTarget {
            descriptor,
            endianness: descriptor.endianness(requested, format),
            path,
        })
    }
}
