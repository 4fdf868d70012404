//! Butler buffer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use soundstream_core::MAX_CHANNELS;

use crate::error::{Error, Result};

/// Widest sample word: 32-bit float.
const MAX_SAMPLE_BYTES: usize = 4;

/// Buffer sizes and transfer granularity for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Ring buffer bytes per stream channel (default: 262144)
    pub buffer_bytes_per_channel: usize,
    /// Upper bound on the whole ring buffer (default: 16 MiB)
    pub max_buffer_bytes: usize,
    /// Largest single disk read (default: 65536)
    pub read_size: usize,
    /// Largest single disk write, and the backlog that triggers one (default: 65536)
    pub write_size: usize,
    /// Largest block the callback may move (default: 128 frames)
    pub max_block_size: usize,
    /// Butler wake-ups per traversal of the ring buffer (default: 16)
    pub signals_per_buffer: usize,
    /// How long the callback waits for the butler before giving up on a
    /// block. `None` waits until the butler answers.
    pub block_wait: Option<Duration>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_bytes_per_channel: 262_144,
            max_buffer_bytes: 16 * 1024 * 1024,
            read_size: 65_536,
            write_size: 65_536,
            max_block_size: 128,
            signals_per_buffer: 16,
            block_wait: None,
        }
    }
}

impl BufferConfig {
    /// Config with a custom per-channel buffer size.
    pub fn with_buffer_bytes(bytes_per_channel: usize) -> Self {
        Self {
            buffer_bytes_per_channel: bytes_per_channel,
            ..Default::default()
        }
    }

    /// Config whose callback gives up after `wait` instead of blocking.
    pub fn with_block_wait(mut self, wait: Duration) -> Self {
        self.block_wait = Some(wait);
        self
    }

    /// Smallest ring buffer: room for four full disk transfers, and for one
    /// maximal block of the widest frame any codec produces.
    pub fn min_buffer_bytes(&self) -> usize {
        let widest_block = MAX_CHANNELS * MAX_SAMPLE_BYTES * self.max_block_size;
        (4 * self.read_size.max(self.write_size)).max(widest_block)
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_size == 0 || self.write_size == 0 {
            return Err(Error::InvalidConfig("transfer sizes must be non-zero".into()));
        }
        if self.max_block_size == 0 || self.signals_per_buffer == 0 {
            return Err(Error::InvalidConfig(
                "block size and signal rate must be non-zero".into(),
            ));
        }
        if self.min_buffer_bytes() > self.max_buffer_bytes {
            return Err(Error::InvalidConfig(format!(
                "maximum buffer {} below minimum {}",
                self.max_buffer_bytes,
                self.min_buffer_bytes()
            )));
        }
        Ok(())
    }

    /// Allocated ring buffer bytes for a stream with `channels` channels.
    pub fn buffer_bytes(&self, channels: usize) -> usize {
        self.buffer_bytes_per_channel
            .saturating_mul(channels)
            .min(self.max_buffer_bytes)
            .max(self.min_buffer_bytes())
    }

    /// Usable ring size: the largest multiple of one maximal block.
    pub fn fifo_size(&self, capacity: usize, bytes_per_frame: usize) -> usize {
        let block = bytes_per_frame * self.max_block_size;
        capacity - capacity % block
    }

    /// Blocks between butler wake-ups.
    pub fn signal_period(&self, fifo_size: usize, bytes_per_frame: usize, block_size: usize) -> usize {
        (fifo_size / (self.signals_per_buffer * bytes_per_frame * block_size)).max(1)
    }

    /// Block sizes must tile the ring buffer exactly.
    pub fn check_block_size(&self, block_size: usize) -> Result<()> {
        if block_size == 0 || self.max_block_size % block_size != 0 {
            return Err(Error::InvalidBlockSize(block_size, self.max_block_size));
        }
        Ok(())
    }
}
