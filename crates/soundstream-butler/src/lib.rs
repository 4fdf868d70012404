//! Streaming sound files to and from a real-time audio callback.
//!
//! [`SoundFileReader`] plays a file back into a fixed number of output
//! channels; [`SoundFileWriter`] records a fixed number of input channels
//! into a new file. Each owns a butler thread that does all disk I/O, so
//! the callback only copies bytes in and out of a ring buffer.
//!
//! Control calls follow the same protocol on both sides:
//!
//! 1. `open` queues a file; the stream enters [`StreamState::Startup`].
//! 2. `start` switches to [`StreamState::Streaming`] on the next block.
//! 3. `process` moves one block per callback until the file ends, `stop`
//!    is called or an error occurs.

mod butler;
mod error;
mod reader;
mod status;
mod writer;

pub use butler::{
    BufferConfig, FileHandle, FsStorage, ReadRequest, RequestCode, Storage, StreamState,
    TransferMetrics, TransferMetricsSnapshot, WriteRequest,
};
pub use error::{Error, Result};
pub use reader::SoundFileReader;
pub use status::{BlockStatus, StreamStatus};
pub use writer::SoundFileWriter;

pub use soundstream_core::{Endianness, SampleFormat, SoundFileInfo};
pub use soundstream_formats::{FormatHint, RawFormat, SoundFileRegistry};
