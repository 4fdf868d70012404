//! Butler thread lifecycle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::request::{RequestCode, StreamState};
use super::transfer::Shared;
use crate::error::{Error, Result};

/// Owns one butler thread and stops it on drop.
pub(crate) struct ButlerThread<P> {
    shared: Arc<Shared<P>>,
    handle: Option<JoinHandle<()>>,
}

impl<P> ButlerThread<P> {
    pub fn spawn<F>(name: &str, shared: Arc<Shared<P>>, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(body)
            .map_err(Error::ThreadSpawn)?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn shared(&self) -> &Shared<P> {
        &self.shared
    }

    /// Ask the butler to finish its file and exit, then join it.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if !handle.is_finished() {
            let mut t = self.shared.transfer.lock();
            t.state = StreamState::Idle;
            t.request = RequestCode::Quit;
            self.shared.wait_acknowledged(&mut t);
        }
        if handle.join().is_err() {
            tracing::error!("butler thread panicked");
        }
    }
}

impl<P> Drop for ButlerThread<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
