//! Background disk I/O for streamed sound files.
//!
//! Each stream owns one butler thread and a byte ring buffer guarded by a
//! single mutex. The audio callback moves one block per call and signals the
//! butler every few blocks; the butler does all file system work with the
//! lock released.

mod config;
mod fifo;
mod metrics;
mod read_task;
mod request;
mod storage;
mod thread;
mod transfer;
mod write_task;

pub use config::BufferConfig;
pub use metrics::{TransferMetrics, TransferMetricsSnapshot};
pub use request::{ReadRequest, RequestCode, StreamState, WriteRequest};
pub use storage::{FileHandle, FsStorage, Storage};

pub(crate) use read_task::ReadTask;
pub(crate) use request::WriteJob;
pub(crate) use thread::ButlerThread;
pub(crate) use transfer::{Shared, StreamTransfer};
pub(crate) use write_task::WriteTask;
