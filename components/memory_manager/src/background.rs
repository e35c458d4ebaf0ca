//! Background sweeping left over from a major collection.
//!
//! A major collection may hand its sweep work to a helper thread. A minor
//! collection must not start while that thread is still running, so the
//! rooting phase joins it first. That join is the only point where the
//! nursery subsystem blocks.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::atomic::AtomicCell;

/// State of the background sweep helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// No sweep has been started, or the last one was joined
    Idle,
    /// The helper thread is working
    Running,
    /// The helper finished but has not been joined yet
    Finished,
}

/// Handle to the background sweep thread.
pub struct BackgroundSweep {
    /// Shared with the helper thread
    state: Arc<AtomicCell<SweepState>>,
    /// Helper thread, if one was started and not yet joined
    handle: Option<JoinHandle<()>>,
}

impl BackgroundSweep {
    /// Creates an idle handle.
    pub fn new() -> Self {
        BackgroundSweep {
            state: Arc::new(AtomicCell::new(SweepState::Idle)),
            handle: None,
        }
    }

    /// Starts `job` on a helper thread.
    ///
    /// Any previous job is joined first. If the thread cannot be spawned the
    /// job runs on the calling thread instead.
    pub fn start<F>(&mut self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.wait();

        self.state.store(SweepState::Running);
        let state = Arc::clone(&self.state);
        let (tx, rx) = crossbeam::channel::bounded::<F>(1);

        let spawned = thread::Builder::new()
            .name("gc-sweep".into())
            .spawn(move || {
                if let Ok(job) = rx.recv() {
                    job();
                }
                state.store(SweepState::Finished);
            });

        match spawned {
            Ok(handle) => {
                // The receiver is alive until the helper exits, so this send
                // only fails if the helper already died.
                if let Err(err) = tx.send(job) {
                    log::warn!("background sweep helper exited early; sweeping inline");
                    (err.into_inner())();
                }
                self.handle = Some(handle);
            }
            Err(err) => {
                log::warn!("failed to spawn background sweep thread: {}", err);
                job();
                self.state.store(SweepState::Finished);
            }
        }
    }

    /// Blocks until the current job (if any) has finished.
    ///
    /// Returns true if there was a job to wait for.
    pub fn wait(&mut self) -> bool {
        let waited = match self.handle.take() {
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("background sweep thread panicked");
                }
                true
            }
            None => self.state.load() == SweepState::Finished,
        };
        self.state.store(SweepState::Idle);
        waited
    }

    /// Current state of the helper.
    pub fn state(&self) -> SweepState {
        self.state.load()
    }

    /// Returns true while a job is running.
    pub fn is_running(&self) -> bool {
        self.state.load() == SweepState::Running
    }
}

impl Default for BackgroundSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundSweep {
    fn drop(&mut self) {
        self.wait();
    }
}
