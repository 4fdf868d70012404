//! Butler loop for playback: open, then keep the ring buffer full.

use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::MutexGuard;

use soundstream_formats::{open_soundfile, SoundFileRegistry};

use super::config::BufferConfig;
use super::request::{ReadRequest, RequestCode};
use super::storage::{FileHandle, Storage};
use super::transfer::{Shared, StreamTransfer};

type Guard<'a> = MutexGuard<'a, StreamTransfer<ReadRequest>>;

pub(crate) struct ReadTask {
    pub shared: Arc<Shared<ReadRequest>>,
    pub storage: Arc<dyn Storage>,
    pub registry: &'static SoundFileRegistry,
    pub config: BufferConfig,
}

/// One `read` call, retried when interrupted.
fn read_some<R: Read + ?Sized>(file: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

impl ReadTask {
    pub fn run(self) {
        let shared = Arc::clone(&self.shared);
        let mut scratch = vec![0u8; self.config.read_size];
        let mut t = shared.transfer.lock();
        tracing::debug!("read butler started");

        loop {
            match t.request {
                RequestCode::Nothing => {
                    shared.answer.notify_all();
                    shared.request.wait(&mut t);
                }
                RequestCode::Open => {
                    if let Some(mut file) = self.open(&mut t) {
                        self.fill(&mut t, &mut file, &mut scratch);
                        MutexGuard::unlocked(&mut t, move || drop(file));
                    }
                    t.file_open = false;
                    if t.request == RequestCode::Busy {
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
        tracing::debug!("read butler exiting");
    }

    /// Open and position the queued file. On failure the error is parked for
    /// the callback and the stream is marked exhausted.
    fn open(&self, t: &mut Guard<'_>) -> Option<Box<dyn FileHandle>> {
        let Some(request) = t.params.take() else {
            t.request = RequestCode::Nothing;
            return None;
        };
        t.request = RequestCode::Busy;
        t.file_error = None;
        t.onset_frames = request.onset_frames;

        let registry = self.registry;
        let storage = &self.storage;
        let opened = MutexGuard::unlocked(t, || {
            let mut file = storage.open(&request.path)?;
            let opened = open_soundfile(registry, &mut file, &request.hint, request.onset_frames)?;
            Ok::<_, soundstream_core::Error>((file, opened))
        });

        if t.request != RequestCode::Busy {
            // Closed or superseded while the header was being parsed.
            if let Ok((file, _)) = opened {
                MutexGuard::unlocked(t, move || drop(file));
            }
            return None;
        }

        match opened {
            Err(error) => {
                tracing::error!(path = %request.path.display(), %error, "cannot open sound file");
                t.fail(error);
                None
            }
            Ok((file, opened)) => {
                let bpf = opened.info.bytes_per_frame();
                let size = self.config.fifo_size(t.fifo.capacity(), bpf);
                let period = self.config.signal_period(size, bpf, t.block_size);
                t.info = opened.info;
                t.has_info = true;
                t.fifo.reset(size);
                t.set_signal_period(period);
                t.file_open = true;
                tracing::debug!(
                    path = %request.path.display(),
                    format = opened.descriptor.name(),
                    fifo_size = size,
                    "streaming from file"
                );
                Some(file)
            }
        }
    }

    /// Read ahead until the file is exhausted or the request changes.
    fn fill(&self, t: &mut Guard<'_>, file: &mut Box<dyn FileHandle>, scratch: &mut [u8]) {
        let shared = &self.shared;
        if t.info.byte_limit == 0 {
            t.eof = true;
            return;
        }
        while t.request == RequestCode::Busy {
            let Some(window) = t.fifo.fill_window(self.config.read_size) else {
                shared.answer.notify_all();
                shared.request.wait(t);
                continue;
            };
            let want = (window as u64).min(t.info.byte_limit) as usize;

            let buf = &mut scratch[..want];
            let result = MutexGuard::unlocked(t, || read_some(&mut *file, buf));
            if t.request != RequestCode::Busy {
                break;
            }

            match result {
                Err(error) => {
                    tracing::error!(%error, "sound file read failed");
                    t.fail(error.into());
                    break;
                }
                Ok(0) => {
                    t.eof = true;
                    break;
                }
                Ok(n) => {
                    let head = t.fifo.head();
                    t.fifo.slice_mut(head, n).copy_from_slice(&scratch[..n]);
                    t.fifo.advance_head(n);
                    t.info.byte_limit -= n as u64;
                    shared.metrics.record_transfer(n as u64);
                    if t.info.byte_limit == 0 {
                        t.eof = true;
                        break;
                    }
                }
            }
            shared.answer.notify_all();
        }
    }
}
