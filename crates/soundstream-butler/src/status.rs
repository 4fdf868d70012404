//! Stream status reporting.

use std::fmt;

use crate::butler::{RequestCode, StreamState, StreamTransfer};

/// Outcome of one callback block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Not streaming; outputs were silenced, inputs ignored.
    Idle,
    /// One full block moved.
    Streamed,
    /// The butler was late; outputs were silenced.
    Underrun,
    /// The block was discarded: the ring buffer stayed full, or the
    /// channel slices did not match the stream.
    Dropped,
    /// The stream ended with this block. `frames` real frames were moved,
    /// the rest of the block is silence.
    Finished { frames: usize },
}

/// Snapshot of a stream for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: StreamState,
    pub request: RequestCode,
    pub file_open: bool,
    pub eof: bool,
    pub failed: bool,
    pub fifo_head: usize,
    pub fifo_tail: usize,
    pub fifo_size: usize,
    pub pending_bytes: usize,
    pub block_size: usize,
    pub channels: usize,
    pub bytes_per_sample: usize,
}

impl StreamStatus {
    pub(crate) fn capture<P>(t: &StreamTransfer<P>) -> Self {
        Self {
            state: t.state,
            request: t.request,
            file_open: t.file_open,
            eof: t.eof,
            failed: t.file_error.is_some(),
            fifo_head: t.fifo.head(),
            fifo_tail: t.fifo.tail(),
            fifo_size: t.fifo.size(),
            pending_bytes: t.fifo.pending(),
            block_size: t.block_size,
            channels: t.info.channels(),
            bytes_per_sample: t.info.bytes_per_sample(),
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state {:?}, request {:?}, file {}, eof {}, head {}, tail {}, size {}, pending {}",
            self.state,
            self.request,
            if self.file_open { "open" } else { "closed" },
            self.eof,
            self.fifo_head,
            self.fifo_tail,
            self.fifo_size,
            self.pending_bytes,
        )?;
        if self.failed {
            write!(f, ", failed")?;
        }
        Ok(())
    }
}
