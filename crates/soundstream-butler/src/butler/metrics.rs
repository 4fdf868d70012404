//! Transfer statistics for one stream.
//!
//! Counters are plain relaxed atomics so the callback can bump them without
//! touching the transfer lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the callback and the butler.
#[derive(Default)]
pub struct TransferMetrics {
    /// Bytes moved between disk and the ring buffer
    bytes: AtomicU64,
    /// Disk read or write calls
    disk_ops: AtomicU64,
    /// Blocks moved by the callback
    blocks: AtomicU64,
    /// Times the callback had to wait for the butler
    waits: AtomicU64,
    /// Blocks output as silence because the butler was late
    underruns: AtomicU64,
    /// Blocks discarded: ring buffer full or mismatched channel slices
    dropped_blocks: AtomicU64,
}

impl TransferMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_transfer(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.disk_ops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_block(&self) {
        self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransferMetricsSnapshot {
        TransferMetricsSnapshot {
            bytes: self.bytes.load(Ordering::Relaxed),
            disk_ops: self.disk_ops.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
        self.disk_ops.store(0, Ordering::Relaxed);
        self.blocks.store(0, Ordering::Relaxed);
        self.waits.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.dropped_blocks.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`TransferMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferMetricsSnapshot {
    pub bytes: u64,
    pub disk_ops: u64,
    pub blocks: u64,
    pub waits: u64,
    pub underruns: u64,
    pub dropped_blocks: u64,
}

impl TransferMetricsSnapshot {
    /// Average bytes per disk call.
    pub fn avg_transfer_size(&self) -> u64 {
        if self.disk_ops == 0 {
            0
        } else {
            self.bytes / self.disk_ops
        }
    }
}
