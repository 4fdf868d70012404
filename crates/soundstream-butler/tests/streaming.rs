//! End-to-end streaming tests: real butler threads, real files or injected
//! storage, callback blocks driven from the test thread.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use soundstream_butler::{
    BlockStatus, BufferConfig, Error, FileHandle, ReadRequest, SampleFormat, SoundFileReader,
    SoundFileRegistry, SoundFileWriter, Storage, StreamState, WriteRequest,
};
use soundstream_core::{convert, Endianness, SoundFileInfo};
use soundstream_formats::{create_soundfile, finish_soundfile};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Distinct 16-bit values per channel and frame, exactly representable.
fn pattern(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|i| ((i as i32 * 37 + ch as i32 * 1000) % 30000 - 15000) as f32 / 32768.0)
                .collect()
        })
        .collect()
}

/// Encode `channels` into a complete file image of the named container.
fn file_image(
    file_type: &str,
    channels: &[Vec<f32>],
    format: SampleFormat,
    endianness: Endianness,
) -> Vec<u8> {
    let descriptor = SoundFileRegistry::global().by_name(file_type).unwrap();
    let frames = channels[0].len();
    let info = SoundFileInfo::new(44100, channels.len(), format, endianness);
    let mut file = Cursor::new(Vec::new());
    let info = create_soundfile(descriptor, &mut file, &info, 0).unwrap();
    let mut data = vec![0u8; frames * info.bytes_per_frame()];
    convert::encode_interleaved(channels, 0, frames, format, endianness, 1.0, &mut data);
    file.write_all(&data).unwrap();
    finish_soundfile(descriptor, &mut file, &info, frames as u64).unwrap();
    file.into_inner()
}

fn write_wave(path: &Path, channels: &[Vec<f32>]) {
    std::fs::write(
        path,
        file_image("wave", channels, SampleFormat::Int16, Endianness::Little),
    )
    .unwrap();
}

fn block(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    vec![vec![9.0; frames]; channels]
}

/// Drive the reader until the stream ends, collecting every frame.
fn drain_reader(reader: &SoundFileReader, channels: usize) -> Vec<Vec<f32>> {
    let frames = reader.block_size();
    let mut collected = vec![Vec::new(); channels];
    for _ in 0..100_000 {
        let mut outputs = block(channels, frames);
        match reader.process(&mut outputs) {
            BlockStatus::Streamed => {
                for (all, out) in collected.iter_mut().zip(&outputs) {
                    all.extend_from_slice(out);
                }
            }
            BlockStatus::Finished { frames } => {
                for (all, out) in collected.iter_mut().zip(&outputs) {
                    all.extend_from_slice(&out[..frames]);
                }
                return collected;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    panic!("stream never finished");
}

/// A file image that fails reads or writes past a byte offset.
struct FailingFile {
    inner: Cursor<Vec<u8>>,
    fail_read_at: u64,
    fail_write_at: u64,
}

impl Read for FailingFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.position() >= self.fail_read_at {
            return Err(io::Error::other("device unplugged"));
        }
        let room = (self.fail_read_at - self.inner.position()) as usize;
        let n = buf.len().min(room);
        self.inner.read(&mut buf[..n])
    }
}

impl Write for FailingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.position() + buf.len() as u64 > self.fail_write_at {
            return Err(io::Error::other("disk full"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

struct FailingStorage {
    image: Vec<u8>,
    fail_read_at: u64,
    fail_write_at: u64,
}

impl Storage for FailingStorage {
    fn open(&self, _path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(FailingFile {
            inner: Cursor::new(self.image.clone()),
            fail_read_at: self.fail_read_at,
            fail_write_at: u64::MAX,
        }))
    }

    fn create(&self, _path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(FailingFile {
            inner: Cursor::new(Vec::new()),
            fail_read_at: u64::MAX,
            fail_write_at: self.fail_write_at,
        }))
    }
}

// ----------------------------------------------------------------------------
// Playback
// ----------------------------------------------------------------------------

#[test]
fn test_read_skip_and_partial_final_block() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    let source = pattern(2, 100);
    write_wave(&path, &source);

    let reader = SoundFileReader::new(2).unwrap();
    reader.open(ReadRequest::new(&path).skip_frames(10));
    reader.start().unwrap();

    let mut outputs = block(2, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Streamed);
    for ch in 0..2 {
        assert_eq!(outputs[ch][..], source[ch][10..74]);
    }

    let mut outputs = block(2, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Finished { frames: 26 });
    for ch in 0..2 {
        assert_eq!(outputs[ch][..26], source[ch][74..100]);
        assert!(outputs[ch][26..].iter().all(|&s| s == 0.0));
    }

    assert_eq!(reader.status().state, StreamState::Idle);
    let mut outputs = block(2, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Idle);
    assert!(outputs.iter().flatten().all(|&s| s == 0.0));
    assert!(reader.take_error().is_none());
}

#[test]
fn test_read_more_outputs_than_file_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    let source = pattern(1, 64);
    write_wave(&path, &source);

    let reader = SoundFileReader::new(3).unwrap();
    reader.open(ReadRequest::new(&path));
    reader.start().unwrap();

    let mut outputs = block(3, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Streamed);
    assert_eq!(outputs[0], source[0]);
    assert!(outputs[1].iter().chain(&outputs[2]).all(|&s| s == 0.0));

    let info = reader.info().unwrap();
    assert_eq!(info.channels(), 1);
    assert_eq!(info.sample_rate, 44100);
}

#[test]
fn test_read_long_file_wraps_ring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.aif");
    // Several times the smallest ring buffer.
    let source = pattern(2, 200_000);
    std::fs::write(
        &path,
        file_image("aiff", &source, SampleFormat::Int24, Endianness::Big),
    )
    .unwrap();

    let reader = SoundFileReader::new(2).unwrap();
    reader.open(ReadRequest::new(&path));
    reader.start().unwrap();
    let read = drain_reader(&reader, 2);

    assert_eq!(read[0].len(), 200_000);
    assert_eq!(read, source);
    let metrics = reader.metrics();
    assert_eq!(metrics.bytes, 200_000 * 6);
    assert_eq!(metrics.blocks, 200_000 / 64);
}

#[test]
fn test_reopen_mid_stream() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.wav");
    let second = dir.path().join("second.wav");
    write_wave(&first, &pattern(1, 10_000));
    let replacement: Vec<Vec<f32>> = vec![(0..256).map(|i| i as f32 / 32768.0).collect()];
    write_wave(&second, &replacement);

    let reader = SoundFileReader::new(1).unwrap();
    reader.open(ReadRequest::new(&first));
    reader.start().unwrap();
    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Streamed);

    reader.open(ReadRequest::new(&second));
    assert_eq!(reader.status().state, StreamState::Startup);
    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Idle);

    reader.start().unwrap();
    let read = drain_reader(&reader, 1);
    assert_eq!(read, replacement);
}

#[test]
fn test_stop_then_wait_idle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stop.wav");
    write_wave(&path, &pattern(2, 50_000));

    let reader = SoundFileReader::new(2).unwrap();
    reader.open(ReadRequest::new(&path));
    reader.start().unwrap();
    let mut outputs = block(2, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Streamed);

    reader.stop();
    reader.wait_idle();
    let status = reader.status();
    assert_eq!(status.state, StreamState::Idle);
    assert!(!status.file_open);
    assert!(matches!(reader.start(), Err(Error::StartWithoutOpen)));
}

#[test]
fn test_missing_file_reports_once() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let reader = SoundFileReader::new(1).unwrap();
    reader.open(ReadRequest::new(dir.path().join("nope.wav")));
    reader.start().unwrap();

    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Finished { frames: 0 });
    assert!(outputs[0].iter().all(|&s| s == 0.0));
    assert_eq!(reader.process(&mut outputs), BlockStatus::Idle);

    match reader.take_error() {
        Some(Error::Format(soundstream_core::Error::Io(e))) => {
            assert_eq!(e.kind(), io::ErrorKind::NotFound)
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(reader.take_error().is_none());
}

#[test]
fn test_read_error_mid_transfer() {
    init_tracing();
    let source = pattern(1, 20_000);
    let image = file_image("wave", &source, SampleFormat::Int16, Endianness::Little);
    let storage = Arc::new(FailingStorage {
        image,
        fail_read_at: 44 + 4096,
        fail_write_at: u64::MAX,
    });
    let config = BufferConfig {
        read_size: 1024,
        ..Default::default()
    };
    let reader =
        SoundFileReader::with_storage(1, config, storage, SoundFileRegistry::global()).unwrap();
    reader.open(ReadRequest::new("failing.wav"));
    reader.start().unwrap();

    let mut streamed = 0;
    let last = loop {
        let mut outputs = block(1, 64);
        match reader.process(&mut outputs) {
            BlockStatus::Streamed => {
                assert_eq!(outputs[0], source[0][streamed * 64..(streamed + 1) * 64]);
                streamed += 1;
            }
            other => {
                assert!(outputs[0].iter().all(|&s| s == 0.0));
                break other;
            }
        }
    };
    assert_eq!(last, BlockStatus::Finished { frames: 0 });
    // 4096 bytes of 16-bit mono is exactly 32 blocks, all played before the end.
    assert_eq!(streamed, 32);
    assert!(reader.status().eof);
    assert!(matches!(
        reader.take_error(),
        Some(Error::Format(soundstream_core::Error::Io(_)))
    ));

    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Idle);
}

#[test]
fn test_read_short_output_drops_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    let source = pattern(1, 1000);
    write_wave(&path, &source);

    let reader = SoundFileReader::new(1).unwrap();
    reader.open(ReadRequest::new(&path));
    reader.start().unwrap();

    let mut short = block(1, 32);
    assert_eq!(reader.process(&mut short), BlockStatus::Dropped);
    assert!(short[0].iter().all(|&s| s == 0.0));
    assert_eq!(reader.metrics().dropped_blocks, 1);

    // Nothing was consumed by the dropped block.
    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Streamed);
    assert_eq!(outputs[0], source[0][..64]);
}

#[test]
fn test_underrun_with_bounded_wait() {
    struct SlowStorage(Vec<u8>);

    struct SlowFile(Cursor<Vec<u8>>);

    impl Read for SlowFile {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // Header reads are fast, sample data is not.
            if self.0.position() >= 44 {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.0.read(buf)
        }
    }
    impl Write for SlowFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    impl Seek for SlowFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.seek(pos)
        }
    }
    impl Storage for SlowStorage {
        fn open(&self, _: &Path) -> io::Result<Box<dyn FileHandle>> {
            Ok(Box::new(SlowFile(Cursor::new(self.0.clone()))))
        }
        fn create(&self, _: &Path) -> io::Result<Box<dyn FileHandle>> {
            Ok(Box::new(SlowFile(Cursor::new(Vec::new()))))
        }
    }

    let image = file_image("wave", &pattern(1, 1000), SampleFormat::Int16, Endianness::Little);
    let config = BufferConfig::default().with_block_wait(Duration::from_millis(1));
    let reader = SoundFileReader::with_storage(
        1,
        config,
        Arc::new(SlowStorage(image)),
        SoundFileRegistry::global(),
    )
    .unwrap();
    reader.open(ReadRequest::new("slow.wav"));
    reader.start().unwrap();

    let mut outputs = block(1, 64);
    assert_eq!(reader.process(&mut outputs), BlockStatus::Underrun);
    assert!(outputs[0].iter().all(|&s| s == 0.0));
    assert_eq!(reader.metrics().underruns, 1);
    assert_eq!(reader.status().state, StreamState::Streaming);
}

// ----------------------------------------------------------------------------
// Recording
// ----------------------------------------------------------------------------

fn record(writer: &SoundFileWriter, source: &[Vec<f32>]) {
    let frames = writer.block_size();
    let blocks = source[0].len() / frames;
    for b in 0..blocks {
        let inputs: Vec<&[f32]> = source
            .iter()
            .map(|ch| &ch[b * frames..(b + 1) * frames])
            .collect();
        assert_eq!(writer.process(&inputs), BlockStatus::Streamed);
    }
}

fn play_back(path: &Path, channels: usize) -> (Vec<Vec<f32>>, SoundFileInfo) {
    let reader = SoundFileReader::new(channels).unwrap();
    reader.open(ReadRequest::new(path));
    reader.start().unwrap();
    let read = drain_reader(&reader, channels);
    let info = reader.info();
    (read, info.unwrap_or_default())
}

#[test]
fn test_record_then_play_back() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = pattern(2, 64 * 100);

    let writer = SoundFileWriter::new(2).unwrap();
    let path = writer
        .open(WriteRequest::new(dir.path().join("take")).sample_rate(48000))
        .unwrap();
    assert_eq!(path, dir.path().join("take.wav"));
    writer.start().unwrap();
    record(&writer, &source);
    writer.stop();
    writer.wait_idle();

    assert_eq!(writer.frames_written(), 6400);
    assert!(writer.take_error().is_none());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 44 + 6400 * 4);

    let reader = SoundFileReader::new(2).unwrap();
    reader.open(ReadRequest::new(&path));
    reader.start().unwrap();
    let read = drain_reader(&reader, 2);
    assert_eq!(read, source);
    assert_eq!(reader.info().map(|i| i.sample_rate), Some(48000));
}

#[test]
fn test_record_each_container() {
    let dir = tempfile::tempdir().unwrap();
    let source = pattern(2, 64 * 20);

    let cases: [(&str, SampleFormat, Option<Endianness>); 5] = [
        ("aiff", SampleFormat::Int16, None),
        ("aiff", SampleFormat::Float32, None),
        ("caf", SampleFormat::Int24, Some(Endianness::Little)),
        ("next", SampleFormat::Int16, Some(Endianness::Little)),
        ("wave", SampleFormat::Float32, None),
    ];
    let writer = SoundFileWriter::new(2).unwrap();
    for (i, (file_type, format, endianness)) in cases.into_iter().enumerate() {
        let mut request = WriteRequest::new(dir.path().join(format!("take{i}")))
            .file_type(file_type)
            .format(format);
        if let Some(endianness) = endianness {
            request = request.endianness(endianness);
        }
        let path = writer.open(request).unwrap();
        writer.start().unwrap();
        record(&writer, &source);
        writer.stop();
        writer.wait_idle();
        assert_eq!(writer.frames_written(), 1280, "{file_type}");

        let (read, _) = play_back(&path, 2);
        assert_eq!(read, source, "{file_type} {format:?}");
    }
}

#[test]
fn test_write_short_input_drops_block() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SoundFileWriter::new(1).unwrap();
    writer
        .open(WriteRequest::new(dir.path().join("short.wav")))
        .unwrap();
    writer.start().unwrap();

    assert_eq!(writer.process(&[vec![0.1f32; 32]]), BlockStatus::Dropped);
    assert_eq!(writer.metrics().dropped_blocks, 1);
    assert_eq!(writer.process(&[vec![0.1f32; 64]]), BlockStatus::Streamed);
    writer.stop();
    writer.wait_idle();

    assert_eq!(writer.frames_written(), 64);
    assert!(writer.take_error().is_none());
}

#[test]
fn test_reopen_finishes_previous_recording() {
    let dir = tempfile::tempdir().unwrap();
    let source = pattern(1, 640);
    let writer = SoundFileWriter::new(1).unwrap();

    let first = writer.open(WriteRequest::new(dir.path().join("a.wav"))).unwrap();
    writer.start().unwrap();
    record(&writer, &source);

    // No explicit stop: the next open closes and finalizes the first file.
    let second = writer.open(WriteRequest::new(dir.path().join("b.wav"))).unwrap();
    assert_eq!(writer.status().state, StreamState::Startup);
    writer.stop();
    writer.wait_idle();

    let (read, _) = play_back(&first, 1);
    assert_eq!(read, source);
    let (read, _) = play_back(&second, 1);
    assert!(read[0].is_empty());
}

#[test]
fn test_write_error_ends_recording() {
    init_tracing();
    let storage = Arc::new(FailingStorage {
        image: Vec::new(),
        fail_read_at: u64::MAX,
        fail_write_at: 44 + 2048,
    });
    let config = BufferConfig {
        write_size: 1024,
        ..Default::default()
    };
    let writer =
        SoundFileWriter::with_storage(1, config, storage, SoundFileRegistry::global()).unwrap();
    writer.open(WriteRequest::new(PathBuf::from("full.wav"))).unwrap();
    writer.start().unwrap();

    let input = [vec![0.5f32; 64]];
    let mut last = BlockStatus::Streamed;
    for _ in 0..100_000 {
        last = writer.process(&input);
        if last != BlockStatus::Streamed {
            break;
        }
    }
    assert_eq!(last, BlockStatus::Finished { frames: 0 });
    assert_eq!(writer.process(&input), BlockStatus::Idle);

    writer.wait_idle();
    assert!(matches!(
        writer.take_error(),
        Some(Error::Format(soundstream_core::Error::Io(_)))
    ));
    // Two full writes reached the disk before it filled up.
    assert_eq!(writer.frames_written(), 1024);
}
