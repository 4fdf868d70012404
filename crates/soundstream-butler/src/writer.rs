//! Recording front end: audio callback to sound file.

use std::path::PathBuf;
use std::sync::Arc;

use soundstream_core::{convert, SoundFileInfo, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};
use soundstream_formats::SoundFileRegistry;

use crate::butler::{
    BufferConfig, ButlerThread, FsStorage, RequestCode, Shared, Storage, StreamState,
    TransferMetricsSnapshot, WriteJob, WriteRequest, WriteTask,
};
use crate::error::{Error, Result};
use crate::reader::default_block_size;
use crate::status::{BlockStatus, StreamStatus};

/// Records a fixed number of input channels into a sound file.
///
/// The header is written when the butler creates the file and rewritten
/// with the true frame count when the file is closed.
pub struct SoundFileWriter {
    butler: ButlerThread<WriteJob>,
    config: BufferConfig,
    channels: usize,
    registry: &'static SoundFileRegistry,
}

impl SoundFileWriter {
    pub fn new(channels: usize) -> Result<Self> {
        Self::with_config(channels, BufferConfig::default())
    }

    pub fn with_config(channels: usize, config: BufferConfig) -> Result<Self> {
        Self::with_storage(channels, config, Arc::new(FsStorage), SoundFileRegistry::global())
    }

    /// Writer over a custom file system and codec registry.
    pub fn with_storage(
        channels: usize,
        config: BufferConfig,
        storage: Arc<dyn Storage>,
        registry: &'static SoundFileRegistry,
    ) -> Result<Self> {
        config.validate()?;
        if channels > MAX_CHANNELS {
            return Err(Error::TooManyChannels(channels));
        }
        let channels = channels.max(1);
        let capacity = config.buffer_bytes(channels);
        let shared = Arc::new(Shared::new(capacity, default_block_size(&config)));

        let task = WriteTask {
            shared: Arc::clone(&shared),
            storage,
            config,
        };
        let butler = ButlerThread::spawn("soundstream-write", shared, move || task.run())?;
        tracing::debug!(channels, capacity, "sound file writer ready");

        Ok(Self {
            butler,
            config,
            channels,
            registry,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Queue a new file and return the path it will be created at.
    ///
    /// The container comes from the request's file type, else the path's
    /// suffix, else WAVE. A recording in progress is finished first.
    pub fn open(&self, request: WriteRequest) -> Result<PathBuf> {
        let target = self.registry.resolve_write(
            &request.path,
            request.file_type.as_deref(),
            request.endianness,
            request.format,
        )?;
        let info = SoundFileInfo::new(
            request.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            self.channels,
            request.format,
            target.endianness,
        );
        let path = target.path.clone();

        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        shared.close_and_wait(&mut t);

        let bpf = info.bytes_per_frame();
        let size = self.config.fifo_size(t.fifo.capacity(), bpf);
        let period = self.config.signal_period(size, bpf, t.block_size);
        t.fifo.reset(size);
        t.set_signal_period(period);
        t.info = info.clone();
        t.has_info = true;
        t.params = Some(WriteJob { target, info });
        t.eof = false;
        t.file_error = None;
        t.frames_done = 0;
        t.state = StreamState::Startup;
        t.request = RequestCode::Open;
        shared.request.notify_one();

        tracing::debug!(path = %path.display(), "open requested");
        Ok(path)
    }

    /// Begin accepting blocks on the next call to `process`.
    pub fn start(&self) -> Result<()> {
        let mut t = self.butler.shared().transfer.lock();
        if t.state != StreamState::Startup {
            return Err(Error::StartWithoutOpen);
        }
        t.state = StreamState::Streaming;
        Ok(())
    }

    /// Stop accepting blocks. The butler drains what is buffered, fixes the
    /// header and closes the file; use [`wait_idle`](Self::wait_idle) to
    /// wait for that.
    pub fn stop(&self) {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        t.state = StreamState::Idle;
        t.request = RequestCode::Close;
        shared.request.notify_one();
    }

    /// Block until the butler has finished and closed its file.
    pub fn wait_idle(&self) {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        shared.wait_acknowledged(&mut t);
    }

    /// Change the callback block size. It must divide `max_block_size`.
    pub fn set_block_size(&self, frames: usize) -> Result<()> {
        self.config.check_block_size(frames)?;
        let mut t = self.butler.shared().transfer.lock();
        t.block_size = frames;
        let period = self
            .config
            .signal_period(t.fifo.size(), t.info.bytes_per_frame(), frames);
        t.set_signal_period(period);
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        self.butler.shared().transfer.lock().block_size
    }

    /// Queue one block of `inputs`, one slice per channel, each at least
    /// `block_size` frames long. A block with the wrong channel count or a
    /// short slice is dropped.
    pub fn process<I: AsRef<[f32]>>(&self, inputs: &[I]) -> BlockStatus {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        if t.state != StreamState::Streaming {
            return BlockStatus::Idle;
        }
        let frames = t.block_size;
        if inputs.len() != t.info.channels()
            || inputs.iter().any(|input| input.as_ref().len() < frames)
        {
            shared.metrics.record_dropped_block();
            return BlockStatus::Dropped;
        }

        let bpf = t.info.bytes_per_frame();
        let want = bpf * frames;
        let mut warned = false;
        loop {
            if t.eof {
                // The butler already logged the failure.
                t.state = StreamState::Idle;
                shared.request.notify_one();
                return BlockStatus::Finished { frames: 0 };
            }
            if t.fifo.free() > want {
                break;
            }
            if !warned {
                tracing::warn!("waiting for disk write");
                warned = true;
            }
            shared.metrics.record_wait();
            shared.request.notify_one();
            match self.config.block_wait {
                None => shared.answer.wait(&mut t),
                Some(limit) => {
                    let timed_out = shared.answer.wait_for(&mut t, limit).timed_out();
                    if timed_out && !t.eof && t.fifo.free() <= want {
                        shared.metrics.record_dropped_block();
                        return BlockStatus::Dropped;
                    }
                }
            }
            if t.state != StreamState::Streaming {
                return BlockStatus::Idle;
            }
        }

        let format = t.info.format();
        let endianness = t.info.endianness;
        let (first, second) = t.fifo.free_segments(want);
        let head = first.len() / bpf;
        convert::encode_interleaved(inputs, 0, head, format, endianness, 1.0, first);
        if !second.is_empty() {
            convert::encode_interleaved(inputs, head, frames - head, format, endianness, 1.0, second);
        }
        t.fifo.advance_head(want);
        shared.metrics.record_block();
        if t.tick() {
            shared.request.notify_one();
        }
        BlockStatus::Streamed
    }

    /// Frames in the last file the butler finished.
    pub fn frames_written(&self) -> u64 {
        self.butler.shared().transfer.lock().frames_done
    }

    /// The error that ended the current file, if any. Cleared by `open`.
    pub fn take_error(&self) -> Option<Error> {
        self.butler
            .shared()
            .transfer
            .lock()
            .file_error
            .take()
            .map(Error::from)
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus::capture(&self.butler.shared().transfer.lock())
    }

    /// Log the current status and return it.
    pub fn print(&self) -> StreamStatus {
        let status = self.status();
        tracing::info!(%status, "sound file writer");
        status
    }

    pub fn metrics(&self) -> TransferMetricsSnapshot {
        self.butler.shared().metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundstream_core::SampleFormat;

    #[test]
    fn test_start_without_open() {
        let writer = SoundFileWriter::new(2).unwrap();
        assert!(matches!(writer.start(), Err(Error::StartWithoutOpen)));
    }

    #[test]
    fn test_unknown_file_type() {
        let writer = SoundFileWriter::new(1).unwrap();
        let err = writer
            .open(WriteRequest::new("x").file_type("mp3"))
            .unwrap_err();
        assert!(matches!(err, Error::Format(soundstream_core::Error::UnknownFileType(_))));
        assert_eq!(writer.status().state, StreamState::Idle);
    }

    #[test]
    fn test_open_resolves_path_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SoundFileWriter::new(2).unwrap();
        let path = writer
            .open(
                WriteRequest::new(dir.path().join("take"))
                    .file_type("aiff")
                    .format(SampleFormat::Int24),
            )
            .unwrap();
        assert_eq!(path, dir.path().join("take.aif"));

        let status = writer.status();
        assert_eq!(status.state, StreamState::Startup);
        assert_eq!(status.channels, 2);
        assert_eq!(status.bytes_per_sample, 3);
        assert_eq!(status.fifo_size % (6 * 128), 0);

        writer.stop();
        writer.wait_idle();
        assert_eq!(writer.frames_written(), 0);
    }

    #[test]
    fn test_idle_ignores_input() {
        let writer = SoundFileWriter::new(1).unwrap();
        let block = vec![0.25f32; 64];
        assert_eq!(writer.process(&[block]), BlockStatus::Idle);
        assert_eq!(writer.metrics().blocks, 0);
    }
}
