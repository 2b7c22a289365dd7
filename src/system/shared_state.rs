//! State shared between the worker thread and its owner.
//!
//! Runs started by the worker and by `reload()` are serialised through
//! `run_lock`; everything else is plain atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Lifecycle of the reconstruction worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for the next poll.
    Idle = 0,
    /// A run is in progress.
    Processing = 1,
    /// The worker loop has exited.
    Terminated = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Processing,
            2 => Self::Terminated,
            _ => Self::Idle,
        }
    }
}

pub struct SharedState {
    /// Request the worker to exit at its next check.
    pub shutdown_requested: AtomicBool,

    state: AtomicU8,

    /// Held for the whole duration of a run.
    pub run_lock: Mutex<()>,

    /// Runs attempted, successful or not.
    runs_attempted: AtomicUsize,

    /// Runs that persisted a map.
    runs_succeeded: AtomicUsize,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Idle -> Processing. A terminated worker stays terminated.
    pub fn begin_run(&self) {
        let _ = self.state.compare_exchange(
            WorkerState::Idle as u8,
            WorkerState::Processing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Processing -> Idle, counting the run.
    pub fn end_run(&self, succeeded: bool) {
        self.runs_attempted.fetch_add(1, Ordering::SeqCst);
        if succeeded {
            self.runs_succeeded.fetch_add(1, Ordering::SeqCst);
        }
        let _ = self.state.compare_exchange(
            WorkerState::Processing as u8,
            WorkerState::Idle as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn mark_terminated(&self) {
        self.state.store(WorkerState::Terminated as u8, Ordering::SeqCst);
    }

    pub fn runs_attempted(&self) -> usize {
        self.runs_attempted.load(Ordering::SeqCst)
    }

    pub fn runs_succeeded(&self) -> usize {
        self.runs_succeeded.load(Ordering::SeqCst)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle as u8),
            run_lock: Mutex::new(()),
            runs_attempted: AtomicUsize::new(0),
            runs_succeeded: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_transitions() {
        let shared = SharedState::new();
        assert_eq!(shared.state(), WorkerState::Idle);

        shared.begin_run();
        assert_eq!(shared.state(), WorkerState::Processing);
        shared.end_run(false);
        assert_eq!(shared.state(), WorkerState::Idle);
        assert_eq!(shared.runs_attempted(), 1);
        assert_eq!(shared.runs_succeeded(), 0);
    }

    #[test]
    fn test_terminated_is_sticky() {
        let shared = SharedState::new();
        shared.mark_terminated();

        shared.begin_run();
        assert_eq!(shared.state(), WorkerState::Terminated);
        shared.end_run(true);
        assert_eq!(shared.state(), WorkerState::Terminated);
        assert_eq!(shared.runs_succeeded(), 1);
    }

    #[test]
    fn test_shutdown_flag() {
        let shared = SharedState::new();
        assert!(!shared.is_shutdown_requested());
        shared.request_shutdown();
        assert!(shared.is_shutdown_requested());
    }
}
