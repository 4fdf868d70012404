//! Playback front end: sound file to audio callback.

use std::sync::Arc;

use soundstream_core::{convert, Endianness, SampleFormat, SoundFileInfo, MAX_CHANNELS};
use soundstream_formats::SoundFileRegistry;

use crate::butler::{
    BufferConfig, ButlerThread, FsStorage, ReadRequest, ReadTask, RequestCode, Shared, Storage,
    StreamState, TransferMetricsSnapshot,
};
use crate::error::{Error, Result};
use crate::status::{BlockStatus, StreamStatus};

/// Default callback block, in frames.
pub(crate) const DEFAULT_BLOCK_SIZE: usize = 64;

pub(crate) fn default_block_size(config: &BufferConfig) -> usize {
    if config.max_block_size % DEFAULT_BLOCK_SIZE == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        config.max_block_size
    }
}

/// Zero `outputs[ch][from..to]`, tolerating short buffers.
pub(crate) fn silence<O: AsMut<[f32]>>(outputs: &mut [O], from: usize, to: usize) {
    for out in outputs.iter_mut() {
        let out = out.as_mut();
        let end = to.min(out.len());
        if from < end {
            out[from..end].fill(0.0);
        }
    }
}

/// Sample layout of the open file, copied out of the lock.
#[derive(Clone, Copy)]
struct Layout {
    channels: usize,
    format: SampleFormat,
    endianness: Endianness,
    bytes_per_frame: usize,
}

impl Layout {
    fn of(info: &SoundFileInfo) -> Self {
        Self {
            channels: info.channels(),
            format: info.format(),
            endianness: info.endianness,
            bytes_per_frame: info.bytes_per_frame(),
        }
    }

    /// Deinterleave ring bytes that may be split at the wrap point.
    fn decode<O: AsMut<[f32]>>(&self, first: &[u8], second: &[u8], outputs: &mut [O]) {
        let head = first.len() / self.bytes_per_frame;
        let rest = second.len() / self.bytes_per_frame;
        convert::decode_interleaved(first, self.channels, self.format, self.endianness, outputs, 0, head);
        if rest > 0 {
            convert::decode_interleaved(
                second,
                self.channels,
                self.format,
                self.endianness,
                outputs,
                head,
                rest,
            );
        }
    }
}

/// Streams a sound file into a fixed number of output channels.
///
/// Control calls (`open`, `start`, `stop`) and `process` may come from
/// different threads. `process` never touches the file system; it only
/// waits for the butler when the ring buffer runs dry.
///
/// # Example
///
/// ```ignore
/// let reader = SoundFileReader::new(2)?;
/// reader.open(ReadRequest::new("loop.wav").skip_frames(44100));
/// reader.start()?;
/// // in the audio callback:
/// let status = reader.process(&mut [left, right]);
/// ```
pub struct SoundFileReader {
    butler: ButlerThread<ReadRequest>,
    config: BufferConfig,
    channels: usize,
}

impl SoundFileReader {
    pub fn new(channels: usize) -> Result<Self> {
        Self::with_config(channels, BufferConfig::default())
    }

    pub fn with_config(channels: usize, config: BufferConfig) -> Result<Self> {
        Self::with_storage(channels, config, Arc::new(FsStorage), SoundFileRegistry::global())
    }

    /// Reader over a custom file system and codec registry.
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

        let task = ReadTask {
            shared: Arc::clone(&shared),
            storage,
            registry,
            config,
        };
        let butler = ButlerThread::spawn("soundstream-read", shared, move || task.run())?;
        tracing::debug!(channels, capacity, "sound file reader ready");

        Ok(Self {
            butler,
            config,
            channels,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Queue a file. Any transfer in progress is closed first, and this
    /// waits until the butler has let go of the old file.
    pub fn open(&self, request: ReadRequest) {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        shared.close_and_wait(&mut t);

        tracing::debug!(path = %request.path.display(), onset = request.onset_frames, "open requested");
        t.params = Some(request);
        t.has_info = false;
        t.fifo.clear();
        t.eof = false;
        t.file_error = None;
        t.state = StreamState::Startup;
        t.request = RequestCode::Open;
        shared.request.notify_one();
    }

    /// Begin streaming the opened file on the next block.
    pub fn start(&self) -> Result<()> {
        let mut t = self.butler.shared().transfer.lock();
        if t.state != StreamState::Startup {
            return Err(Error::StartWithoutOpen);
        }
        t.state = StreamState::Streaming;
        Ok(())
    }

    /// Stop streaming and close the file. Returns without waiting.
    pub fn stop(&self) {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        t.state = StreamState::Idle;
        t.request = RequestCode::Close;
        shared.request.notify_one();
    }

    /// Block until the butler has closed its file or finished reading it.
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

    /// Fill one block of `outputs`, one slice per channel, each at least
    /// `block_size` frames long.
    ///
    /// Outputs beyond the file's channels get silence; file channels beyond
    /// the outputs are skipped. A block with any output shorter than
    /// `block_size` is silenced and reported as `Dropped`, leaving the
    /// buffered data for the next call.
    ///
    /// After a read error the frames buffered before it are still played;
    /// the stream then ends like a clean end of file.
    pub fn process<O: AsMut<[f32]>>(&self, outputs: &mut [O]) -> BlockStatus {
        let shared = self.butler.shared();
        let mut t = shared.transfer.lock();
        let frames = t.block_size;

        if t.state != StreamState::Streaming {
            drop(t);
            silence(outputs, 0, frames);
            return BlockStatus::Idle;
        }
        if outputs.iter_mut().any(|out| out.as_mut().len() < frames) {
            drop(t);
            shared.metrics.record_dropped_block();
            silence(outputs, 0, frames);
            return BlockStatus::Dropped;
        }

        loop {
            let want = t.info.bytes_per_frame() * frames;
            if t.eof || t.fifo.pending() >= want {
                break;
            }
            shared.metrics.record_wait();
            shared.request.notify_one();
            match self.config.block_wait {
                None => shared.answer.wait(&mut t),
                Some(limit) => {
                    let timed_out = shared.answer.wait_for(&mut t, limit).timed_out();
                    if timed_out
                        && t.state == StreamState::Streaming
                        && !t.eof
                        && t.fifo.pending() < want
                    {
                        drop(t);
                        shared.metrics.record_underrun();
                        silence(outputs, 0, frames);
                        return BlockStatus::Underrun;
                    }
                }
            }
            if t.state != StreamState::Streaming {
                drop(t);
                silence(outputs, 0, frames);
                return BlockStatus::Idle;
            }
        }

        let layout = Layout::of(&t.info);
        let want = layout.bytes_per_frame * frames;
        let pending = t.fifo.pending();

        if pending < want {
            let available = pending / layout.bytes_per_frame;
            let bytes = available * layout.bytes_per_frame;
            let (first, second) = t.fifo.pending_segments(bytes);
            layout.decode(first, second, outputs);
            t.fifo.advance_tail(bytes);
            t.state = StreamState::Idle;
            shared.request.notify_one();
            let failed = t.file_error.is_some();
            drop(t);
            silence(outputs, available, frames);
            tracing::debug!(frames = available, failed, "end of sound file");
            return BlockStatus::Finished { frames: available };
        }

        let (first, second) = t.fifo.pending_segments(want);
        layout.decode(first, second, outputs);
        t.fifo.advance_tail(want);
        shared.metrics.record_block();
        if t.tick() {
            shared.request.notify_one();
        }
        BlockStatus::Streamed
    }

    /// Layout of the current file, available once the butler opened it.
    pub fn info(&self) -> Option<SoundFileInfo> {
        let t = self.butler.shared().transfer.lock();
        t.has_info.then(|| t.info.clone())
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
        tracing::info!(%status, "sound file reader");
        status
    }

    pub fn metrics(&self) -> TransferMetricsSnapshot {
        self.butler.shared().metrics.snapshot()
    }
}
