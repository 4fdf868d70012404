//! Opening, creating and finishing sound files through the registry.

use std::io::{Read, Seek, SeekFrom, Write};

use soundstream_core::{Error, Result, SoundFileInfo, MAX_CHANNELS};

use crate::raw::RawFormat;
use crate::registry::{FileTypeDescriptor, ReadSeek, SoundFileRegistry, WriteSeek};

/// How to find the layout of a file being opened for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    /// Probe the first bytes and ask every registered descriptor.
    #[default]
    Detect,
    /// Headerless, with the given layout.
    Raw(RawFormat),
}

/// A file positioned at its first requested sample.
#[derive(Debug, Clone)]
pub struct OpenedSoundFile {
    pub descriptor: &'static dyn FileTypeDescriptor,
    /// `byte_limit` counts the bytes left after the skipped frames.
    pub info: SoundFileInfo,
}

/// Read up to `size` leading bytes for detection.
fn read_probe(file: &mut dyn ReadSeek, size: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut probe = Vec::with_capacity(size);
    Read::take(&mut *file, size as u64).read_to_end(&mut probe)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(probe)
}

/// Parse the header of `file` and seek past `skip_frames` frames.
///
/// The data length is clamped to what the file actually holds, so sizes
/// declared in the header are never trusted beyond the end of the file.
pub fn open_soundfile(
    registry: &SoundFileRegistry,
    file: &mut dyn ReadSeek,
    hint: &FormatHint,
    skip_frames: u64,
) -> Result<OpenedSoundFile> {
    let (descriptor, mut info) = match hint {
        FormatHint::Raw(raw) => {
            let descriptor = registry.raw();
            let mut info = descriptor.read_header(file)?;
            raw.apply(&mut info);
            (descriptor, info)
        }
        FormatHint::Detect => {
            let probe = read_probe(file, registry.probe_size())?;
            let descriptor = registry
                .detect(&probe)
                .ok_or_else(|| Error::malformed("no recognized format"))?;
            (descriptor, descriptor.read_header(file)?)
        }
    };

    if info.channels() > MAX_CHANNELS {
        return Err(Error::malformed(format!("{} channels", info.channels())));
    }
    let header = info.header_size.unwrap_or(0);
    let file_len = file.seek(SeekFrom::End(0))?;
    let available = file_len.saturating_sub(header);
    if info.byte_limit > available {
        if info.byte_limit != SoundFileInfo::UNBOUNDED {
            tracing::debug!(
                declared = info.byte_limit,
                available,
                "data length exceeds file, clamping"
            );
        }
        info.byte_limit = available;
    }

    let bpf = info.bytes_per_frame() as u64;
    let skip = skip_frames.saturating_mul(bpf).min(info.byte_limit / bpf * bpf);
    info.byte_limit -= skip;
    file.seek(SeekFrom::Start(header + skip))?;

    tracing::debug!(
        format = descriptor.name(),
        channels = info.channels(),
        bytes_per_sample = info.bytes_per_sample(),
        sample_rate = info.sample_rate,
        header,
        byte_limit = info.byte_limit,
        "opened sound file"
    );
    Ok(OpenedSoundFile { descriptor, info })
}

/// Write a provisional header sized for `frames` and return `info` with the
/// header size filled in. The file is left at the first sample position.
pub fn create_soundfile(
    descriptor: &dyn FileTypeDescriptor,
    file: &mut dyn WriteSeek,
    info: &SoundFileInfo,
    frames: u64,
) -> Result<SoundFileInfo> {
    let header = descriptor.write_header(file, info, frames)?;
    let mut info = info.clone();
    info.header_size = Some(header);
    info.byte_limit = SoundFileInfo::UNBOUNDED;
    Ok(info)
}

/// Rewrite the length fields for the frames actually written and flush.
pub fn finish_soundfile(
    descriptor: &dyn FileTypeDescriptor,
    file: &mut dyn WriteSeek,
    info: &SoundFileInfo,
    frames: u64,
) -> Result<()> {
    descriptor.update_header(file, info, frames)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundstream_core::{Endianness, SampleFormat};
    use std::io::Cursor;

    fn wave_with_frames(frames: usize) -> Cursor<Vec<u8>> {
        let reg = SoundFileRegistry::global();
        let wave = reg.by_name("wave").unwrap();
        let info = SoundFileInfo::new(44100, 2, SampleFormat::Int16, Endianness::Little);
        let mut file = Cursor::new(Vec::new());
        create_soundfile(wave, &mut file, &info, frames as u64).unwrap();
        file.write_all(&vec![0u8; frames * 4]).unwrap();
        file
    }

    #[test]
    fn test_open_skips_frames() {
        let mut file = wave_with_frames(100);
        let opened =
            open_soundfile(SoundFileRegistry::global(), &mut file, &FormatHint::Detect, 10)
                .unwrap();
        assert_eq!(opened.descriptor.name(), "wave");
        assert_eq!(opened.info.byte_limit, 90 * 4);
        assert_eq!(file.position(), 44 + 40);
    }

    #[test]
    fn test_skip_past_end_leaves_nothing() {
        let mut file = wave_with_frames(5);
        let opened =
            open_soundfile(SoundFileRegistry::global(), &mut file, &FormatHint::Detect, 50)
                .unwrap();
        assert_eq!(opened.info.byte_limit, 0);
    }

    #[test]
    fn test_declared_length_clamped_to_file() {
        let mut file = wave_with_frames(10);
        file.get_mut().truncate(44 + 12);
        let opened =
            open_soundfile(SoundFileRegistry::global(), &mut file, &FormatHint::Detect, 0)
                .unwrap();
        assert_eq!(opened.info.byte_limit, 12);
    }

    #[test]
    fn test_unrecognized_is_malformed() {
        let mut file = Cursor::new(b"OggS and some more bytes to fill the probe".to_vec());
        let err = open_soundfile(SoundFileRegistry::global(), &mut file, &FormatHint::Detect, 0)
            .unwrap_err();
        match err {
            Error::MalformedHeader(msg) => assert_eq!(msg, "no recognized format"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_raw_hint() {
        let mut file = Cursor::new(vec![0u8; 64]);
        let hint = FormatHint::Raw(RawFormat::new(1, SampleFormat::Float32).header_size(16));
        let opened = open_soundfile(SoundFileRegistry::global(), &mut file, &hint, 2).unwrap();
        assert_eq!(opened.descriptor.name(), "raw");
        assert_eq!(opened.info.byte_limit, 40);
        assert_eq!(file.position(), 24);
    }
}
