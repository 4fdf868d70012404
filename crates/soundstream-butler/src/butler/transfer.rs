//! State shared between a front end and its butler thread.

use parking_lot::{Condvar, Mutex, MutexGuard};

use soundstream_core::{Error, SoundFileInfo};

use super::fifo::Fifo;
use super::metrics::TransferMetrics;
use super::request::{RequestCode, StreamState};

/// Everything guarded by the transfer lock.
pub(crate) struct StreamTransfer<P> {
    pub fifo: Fifo,
    pub state: StreamState,
    pub request: RequestCode,
    /// Parameters for the next `Open`.
    pub params: Option<P>,
    /// Layout of the current file.
    pub info: SoundFileInfo,
    /// `info` describes the file of the current request.
    pub has_info: bool,
    /// Read side: file exhausted or failed. Write side: file failed.
    pub eof: bool,
    /// First error of the current file, until the front end reports it.
    pub file_error: Option<Error>,
    pub file_open: bool,
    pub onset_frames: u64,
    /// Frames per callback block.
    pub block_size: usize,
    /// Blocks between butler wake-ups, and blocks left until the next one.
    pub sig_period: usize,
    pub sig_countdown: usize,
    /// Frames committed to the file by the last finished write.
    pub frames_done: u64,
}

impl<P> StreamTransfer<P> {
    fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            fifo: Fifo::new(capacity),
            state: StreamState::Idle,
            request: RequestCode::Nothing,
            params: None,
            info: SoundFileInfo::default(),
            has_info: false,
            eof: false,
            file_error: None,
            file_open: false,
            onset_frames: 0,
            block_size,
            sig_period: 1,
            sig_countdown: 1,
            frames_done: 0,
        }
    }

    /// Restart the wake-up countdown with a new period.
    pub fn set_signal_period(&mut self, period: usize) {
        self.sig_period = period.max(1);
        self.sig_countdown = self.sig_period;
    }

    /// Count one block; true when the butler is due a wake-up.
    pub fn tick(&mut self) -> bool {
        self.sig_countdown = self.sig_countdown.saturating_sub(1);
        if self.sig_countdown == 0 {
            self.sig_countdown = self.sig_period;
            true
        } else {
            false
        }
    }

    /// Record a failure unless an earlier one is still unreported.
    pub fn fail(&mut self, error: Error) {
        self.eof = true;
        if self.file_error.is_none() {
            self.file_error = Some(error);
        }
    }
}

/// One mutex and two condition variables per stream.
///
/// The front end signals `request` whenever it changes the request code or
/// frees or fills the ring; the butler signals `answer` whenever it makes
/// progress or goes idle.
pub(crate) struct Shared<P> {
    pub transfer: Mutex<StreamTransfer<P>>,
    pub request: Condvar,
    pub answer: Condvar,
    pub metrics: TransferMetrics,
}

impl<P> Shared<P> {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            transfer: Mutex::new(StreamTransfer::new(capacity, block_size)),
            request: Condvar::new(),
            answer: Condvar::new(),
            metrics: TransferMetrics::new(),
        }
    }

    /// Block until the butler has acknowledged the current request.
    ///
    /// Only meaningful once the request is `Close`, `Quit` or `Nothing`;
    /// a `Busy` butler never acknowledges on its own.
    pub fn wait_acknowledged(&self, transfer: &mut MutexGuard<'_, StreamTransfer<P>>) {
        while transfer.request != RequestCode::Nothing {
            self.request.notify_one();
            self.answer.wait(transfer);
        }
    }

    /// Stop any transfer in progress and wait for the butler to let go of
    /// the file. The callback goes idle immediately.
    pub fn close_and_wait(&self, transfer: &mut MutexGuard<'_, StreamTransfer<P>>) {
        transfer.state = StreamState::Idle;
        if transfer.request != RequestCode::Nothing {
            transfer.request = RequestCode::Close;
            self.wait_acknowledged(transfer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_countdown() {
        let shared: Shared<()> = Shared::new(1024, 64);
        let mut t = shared.transfer.lock();
        t.set_signal_period(3);
        assert!(!t.tick());
        assert!(!t.tick());
        assert!(t.tick());
        assert!(!t.tick());

        t.set_signal_period(0);
        assert!(t.tick());
    }

    #[test]
    fn test_first_error_wins() {
        let shared: Shared<()> = Shared::new(1024, 64);
        let mut t = shared.transfer.lock();
        t.fail(Error::malformed("first"));
        t.fail(Error::Eof);
        assert!(t.eof);
        assert!(matches!(t.file_error, Some(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_wait_acknowledged_when_idle() {
        let shared: Shared<()> = Shared::new(1024, 64);
        let mut t = shared.transfer.lock();
        shared.close_and_wait(&mut t);
        assert_eq!(t.request, RequestCode::Nothing);
        assert_eq!(t.state, StreamState::Idle);
    }
}
