//! Sound file container codecs.
//!
//! Each container is a [`FileTypeDescriptor`]: it recognizes its magic,
//! parses a header into a [`SoundFileInfo`], writes a provisional header and
//! patches the length fields once the real frame count is known.
//!
//! | name   | suffixes               | byte order                        |
//! |--------|------------------------|-----------------------------------|
//! | `wave` | `.wav` `.wave`         | little                            |
//! | `aiff` | `.aif` `.aiff` `.aifc` | big, little via AIFF-C `sowt`     |
//! | `caf`  | `.caf`                 | as requested, big by default      |
//! | `next` | `.snd` `.au`           | as requested, big by default      |
//! | `raw`  | none                   | as requested, host by default     |
//!
//! # Example
//!
//! ```ignore
//! use soundstream_formats::{open_soundfile, FormatHint, SoundFileRegistry};
//!
//! let mut file = std::fs::File::open("take1.aif")?;
//! let opened = open_soundfile(SoundFileRegistry::global(), &mut file, &FormatHint::Detect, 0)?;
//! println!("{} channels", opened.info.channels());
//! ```

mod aiff;
mod caf;
mod cursor;
mod extended;
mod next;
mod raw;
mod registry;
mod soundfile;
mod wave;

pub use aiff::{AiffFormat, CommonChunk, Compression};
pub use caf::{AudioDescription, CafFormat};
pub use cursor::{FieldCursor, FieldWriter};
pub use next::{NextFormat, NextHeader};
pub use raw::{RawFileFormat, RawFormat};
pub use registry::{FileTypeDescriptor, ReadSeek, SoundFileRegistry, WriteSeek, WriteTarget};
pub use soundfile::{create_soundfile, finish_soundfile, open_soundfile, FormatHint, OpenedSoundFile};
pub use wave::{WaveFormat, WaveFormatChunk};

pub use soundstream_core::{Endianness, Error, Result, SampleFormat, SoundFileInfo};
