//! Butler loop for recording: create, drain the ring buffer, finish the header.

use std::io::Write;
use std::sync::Arc;

use parking_lot::MutexGuard;

use soundstream_formats::{create_soundfile, finish_soundfile};

use super::config::BufferConfig;
use super::request::{RequestCode, WriteJob};
use super::storage::{FileHandle, Storage};
use super::transfer::{Shared, StreamTransfer};

type Guard<'a> = MutexGuard<'a, StreamTransfer<WriteJob>>;

pub(crate) struct WriteTask {
    pub shared: Arc<Shared<WriteJob>>,
    pub storage: Arc<dyn Storage>,
    pub config: BufferConfig,
}

impl WriteTask {
    pub fn run(self) {
        let shared = Arc::clone(&self.shared);
        let mut scratch = vec![0u8; self.config.write_size];
        let mut t = shared.transfer.lock();
        tracing::debug!("write butler started");

        loop {
            match t.request {
                RequestCode::Nothing => {
                    shared.answer.notify_all();
                    shared.request.wait(&mut t);
                }
                RequestCode::Open => {
                    if let Some(job) = t.params.take() {
                        self.record(&mut t, job, &mut scratch);
                    }
                    t.file_open = false;
                    if matches!(t.request, RequestCode::Busy | RequestCode::Close) {
                        t.request = RequestCode::Nothing;
                    }
                    shared.answer.notify_all();
                }
                RequestCode::Busy | RequestCode::Close => {
                    t.request = RequestCode::Nothing;
                    shared.answer.notify_all();
                }
                RequestCode::Quit => {
                    t.request = RequestCode::Nothing;
                    shared.answer.notify_all();
                    break;
                }
            }
        }
        tracing::debug!("write butler exiting");
    }

    /// Create the file, stream the ring buffer into it until closed, then
    /// rewrite the header for the frames that actually reached the disk.
    fn record(&self, t: &mut Guard<'_>, job: WriteJob, scratch: &mut [u8]) {
        let shared = &self.shared;
        t.request = RequestCode::Busy;
        t.frames_done = 0;

        let storage = &self.storage;
        let descriptor = job.target.descriptor;
        let created = MutexGuard::unlocked(t, || {
            let mut file = storage.create(&job.target.path)?;
            let info = create_soundfile(descriptor, &mut file, &job.info, 0)?;
            Ok::<_, soundstream_core::Error>((file, info))
        });
        let (mut file, info) = match created {
            Ok(created) => created,
            Err(error) => {
                tracing::error!(path = %job.target.path.display(), %error, "cannot create sound file");
                t.fail(error);
                return;
            }
        };
        t.file_open = true;
        tracing::debug!(
            path = %job.target.path.display(),
            format = descriptor.name(),
            "recording to file"
        );

        let written = self.drain(t, &mut file, scratch);
        let bpf = info.bytes_per_frame() as u64;
        if written % bpf != 0 {
            tracing::warn!(written, "partial frame at end of recording");
        }
        let frames = written / bpf;

        let finished = MutexGuard::unlocked(t, || {
            let result = finish_soundfile(descriptor, &mut file, &info, frames);
            drop(file);
            result
        });
        if let Err(error) = finished {
            tracing::error!(%error, "cannot finish sound file header");
            t.fail(error);
        }
        t.frames_done = frames;
        shared.answer.notify_all();
    }

    /// Move pending bytes to disk until the stream is closed and the ring is
    /// empty, or a write fails. Returns the bytes written.
    fn drain(&self, t: &mut Guard<'_>, file: &mut Box<dyn FileHandle>, scratch: &mut [u8]) -> u64 {
        let shared = &self.shared;
        let mut written = 0u64;
        loop {
            let flushing = matches!(t.request, RequestCode::Close | RequestCode::Quit);
            if t.request != RequestCode::Busy && !(flushing && t.fifo.pending() > 0) {
                break;
            }
            let Some(n) = t.fifo.drain_window(self.config.write_size, flushing) else {
                shared.answer.notify_all();
                shared.request.wait(t);
                continue;
            };

            let tail = t.fifo.tail();
            scratch[..n].copy_from_slice(t.fifo.slice(tail, n));
            let chunk = &scratch[..n];
            let result = MutexGuard::unlocked(t, || file.write_all(chunk));

            match result {
                Err(error) => {
                    tracing::error!(%error, "sound file write failed");
                    t.fail(error.into());
                    break;
                }
                Ok(()) => {
                    t.fifo.advance_tail(n);
                    written += n as u64;
                    shared.metrics.record_transfer(n as u64);
                }
            }
            shared.answer.notify_all();
        }
        written
    }
}
