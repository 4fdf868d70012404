//! Whole-file reads and writes, outside any real-time context.
//!
//! [`read`] fills one `Vec<f32>` per channel from a sound file and [`write`]
//! does the reverse. Both go through the same codec registry the streaming
//! front ends use, so every container and sample format is available here.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read};
use std::path::{Path, PathBuf};

use soundstream_core::{
    convert, Endianness, SampleFormat, SoundFileInfo, DEFAULT_SAMPLE_RATE, MAX_CHANNELS,
};
use soundstream_formats::{
    create_soundfile, finish_soundfile, open_soundfile, FileTypeDescriptor, FormatHint, RawFormat,
    SoundFileRegistry, WriteSeek,
};

use crate::error::{Error, Result};

/// Frame cap applied by [`ReadOptions::resize`] when no explicit maximum is given.
pub const DEFAULT_MAX_SIZE: usize = 4_000_000;

/// Bytes moved per disk call.
const CHUNK_BYTES: usize = 65536;

/// Options for [`read`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadOptions {
    /// Frames to skip at the start of the data.
    pub skip_frames: u64,
    /// Resize every target to the frames available.
    pub resize: bool,
    /// Upper bound on the resized length. Setting it implies `resize`.
    pub max_size: Option<usize>,
    /// Read headerless data with this layout instead of detecting a header.
    pub raw: Option<RawFormat>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_frames(mut self, frames: u64) -> Self {
        self.skip_frames = frames;
        self
    }

    pub fn resize(mut self) -> Self {
        self.resize = true;
        self
    }

    pub fn max_size(mut self, frames: usize) -> Self {
        self.max_size = Some(frames);
        self.resize = true;
        self
    }

    pub fn raw(mut self, raw: RawFormat) -> Self {
        self.raw = Some(raw);
        self
    }

    fn hint(&self) -> FormatHint {
        self.raw.map_or(FormatHint::Detect, FormatHint::Raw)
    }
}

/// Result of a [`read`].
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// Frames actually decoded into the targets.
    pub frames: usize,
    /// Layout of the file. `byte_limit` counts the data after the skip.
    pub info: SoundFileInfo,
}

/// Options for [`write`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Frames to skip at the start of every source.
    pub skip_frames: usize,
    /// Frames to write, `None` for everything after the skip.
    pub frames: Option<usize>,
    pub format: SampleFormat,
    /// Container name. `None` picks it from the path's suffix, else WAVE.
    pub file_type: Option<String>,
    /// Requested byte order, subject to what the container allows.
    pub endianness: Option<Endianness>,
    /// Scale the peak to full scale.
    pub normalize: bool,
    pub sample_rate: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            skip_frames: 0,
            frames: None,
            format: SampleFormat::Int16,
            file_type: None,
            endianness: None,
            normalize: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_frames(mut self, frames: usize) -> Self {
        self.skip_frames = frames;
        self
    }

    pub fn frames(mut self, frames: usize) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn file_type(mut self, name: impl Into<String>) -> Self {
        self.file_type = Some(name.into());
        self
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    pub fn normalize(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }
}

/// Result of a [`write`].
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub frames: u64,
    pub info: SoundFileInfo,
    /// Where the file ended up, default suffix included.
    pub path: PathBuf,
}

fn check_channels(count: usize) -> Result<()> {
    match count {
        0 => Err(Error::NoChannels),
        n if n > MAX_CHANNELS => Err(Error::TooManyChannels(n)),
        _ => Ok(()),
    }
}

/// Read until `buf` is full or the file ends.
fn read_full<R: Read + ?Sized>(file: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read `path` into `targets`, one vector per channel.
///
/// Targets past the file's channels are zeroed and file channels past the
/// targets are dropped. Without resizing, every target keeps its length and
/// whatever the file cannot fill is zeroed; targets of unequal length force
/// a resize.
pub fn read(path: impl AsRef<Path>, targets: &mut [Vec<f32>], options: &ReadOptions) -> Result<ReadOutcome> {
    let path = path.as_ref();
    check_channels(targets.len())?;

    let mut resize = options.resize;
    if !resize && targets.iter().any(|t| t.len() != targets[0].len()) {
        tracing::info!("targets have different lengths; resizing");
        resize = true;
    }

    let mut file = BufReader::new(File::open(path)?);
    let opened = open_soundfile(
        SoundFileRegistry::global(),
        &mut file,
        &options.hint(),
        options.skip_frames,
    )?;
    let info = opened.info;
    let bpf = info.bytes_per_frame();
    let available = usize::try_from(info.byte_limit / bpf as u64).unwrap_or(usize::MAX);

    let frames = if resize {
        let max_size = options.max_size.unwrap_or(DEFAULT_MAX_SIZE);
        if available > max_size {
            tracing::warn!(path = %path.display(), max_size, "truncated to maximum size");
        }
        let frames = available.min(max_size);
        for target in targets.iter_mut() {
            target.resize(frames, 0.0);
        }
        frames
    } else {
        targets[0].len().min(available)
    };

    let chunk_frames = (CHUNK_BYTES / bpf).max(1);
    let mut buf = vec![0u8; chunk_frames * bpf];
    let mut done = 0;
    while done < frames {
        let want = (frames - done).min(chunk_frames);
        let got = read_full(&mut file, &mut buf[..want * bpf])? / bpf;
        if got == 0 {
            break;
        }
        convert::decode_interleaved(
            &buf[..got * bpf],
            info.channels(),
            info.format(),
            info.endianness,
            targets,
            done,
            got,
        );
        done += got;
        if got < want {
            break;
        }
    }

    for target in targets.iter_mut() {
        if done < target.len() {
            target[done..].fill(0.0);
        }
    }

    tracing::debug!(path = %path.display(), frames = done, channels = info.channels(), "read sound file");
    Ok(ReadOutcome { frames: done, info })
}

/// Write `sources`, one slice per channel, to a new sound file.
///
/// Integer output is normalized automatically when the peak exceeds full
/// scale. The container and final path are resolved like
/// [`SoundFileRegistry::resolve_write`].
pub fn write<I: AsRef<[f32]>>(
    path: impl AsRef<Path>,
    sources: &[I],
    options: &WriteOptions,
) -> Result<WriteOutcome> {
    check_channels(sources.len())?;

    let onset = options.skip_frames;
    let mut frames = sources
        .iter()
        .map(|s| s.as_ref().len().saturating_sub(onset))
        .min()
        .unwrap_or(0);
    if let Some(limit) = options.frames {
        frames = frames.min(limit);
    }
    if frames == 0 {
        return Err(Error::NoSamplesAtOnset(onset));
    }

    let target = SoundFileRegistry::global().resolve_write(
        path.as_ref(),
        options.file_type.as_deref(),
        options.endianness,
        options.format,
    )?;
    let info = SoundFileInfo::new(
        options.sample_rate,
        sources.len(),
        options.format,
        target.endianness,
    );

    let peak = convert::peak(sources, onset, frames);
    let normalize = options.normalize || (!options.format.is_float() && peak > 1.0);
    let gain = if normalize {
        tracing::info!(path = %target.path.display(), peak, "normalizing max amplitude to 1");
        convert::normalization_factor(peak)
    } else {
        tracing::debug!(path = %target.path.display(), peak, "biggest amplitude");
        1.0
    };

    let mut file = BufWriter::new(File::create(&target.path)?);
    let written = write_frames(&mut file, target.descriptor, &info, sources, onset, frames, gain)?;

    tracing::debug!(
        path = %target.path.display(),
        format = target.descriptor.name(),
        frames = written,
        "wrote sound file"
    );
    Ok(WriteOutcome {
        frames: written,
        info,
        path: target.path,
    })
}

/// Header, samples and final length fields. A failed sample write still
/// closes the file with the frames that made it.
fn write_frames<I: AsRef<[f32]>>(
    file: &mut dyn WriteSeek,
    descriptor: &dyn FileTypeDescriptor,
    info: &SoundFileInfo,
    sources: &[I],
    onset: usize,
    frames: usize,
    gain: f32,
) -> Result<u64> {
    let info = create_soundfile(descriptor, file, info, frames as u64)?;
    let bpf = info.bytes_per_frame();
    let chunk_frames = (CHUNK_BYTES / bpf).max(1);
    let mut buf = vec![0u8; chunk_frames * bpf];

    let mut done = 0;
    let mut failure = None;
    while done < frames {
        let n = (frames - done).min(chunk_frames);
        let bytes = &mut buf[..n * bpf];
        convert::encode_interleaved(sources, onset + done, n, info.format(), info.endianness, gain, bytes);
        if let Err(e) = file.write_all(bytes) {
            tracing::error!(error = %e, written = done, "sound file write failed");
            failure = Some(e);
            break;
        }
        done += n;
    }

    finish_soundfile(descriptor, file, &info, done as u64)?;
    match failure {
        None => Ok(done as u64),
        Some(source) => Err(Error::ShortWrite {
            written: done as u64,
            expected: frames as u64,
            source,
        }),
    }
}
