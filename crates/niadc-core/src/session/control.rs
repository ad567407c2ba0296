//! Session-wide failure signal shared by both worker threads

use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Thread that raised a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Acquisition,
    Export,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Acquisition => write!(f, "acquisition"),
            Component::Export => write!(f, "export"),
        }
    }
}

/// Notification that a session thread hit a fatal error
#[derive(Debug, Clone)]
pub struct Failure {
    pub component: Component,
    pub message: String,
}

/// Shared state observed by the acquisition and export threads
///
/// The first reported failure flips `failed`, which makes both loops wind
/// down. Every report is also queued on a channel so the session owner can
/// block on it.
pub struct SessionControl {
    failed: AtomicBool,
    failure_tx: Sender<Failure>,
    failure_rx: Receiver<Failure>,
}

impl SessionControl {
    pub fn new() -> Self {
        let (failure_tx, failure_rx) = crossbeam_channel::unbounded();
        Self {
            failed: AtomicBool::new(false),
            failure_tx,
            failure_rx,
        }
    }

    /// Record a fatal error from one of the session threads
    pub fn report(&self, component: Component, error: &dyn std::error::Error) {
        let message = error.to_string();
        tracing::error!(%component, error = %message, "Session failure");
        self.failed.store(true, Ordering::Release);
        let _ = self.failure_tx.send(Failure { component, message });
    }

    /// True once any thread has reported a failure
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Block until a failure is reported or the timeout elapses
    pub fn wait_for_failure(&self, timeout: Duration) -> Option<Failure> {
        self.failure_rx.recv_timeout(timeout).ok()
    }

    /// All failures reported so far, without blocking
    pub fn failures(&self) -> Vec<Failure> {
        self.failure_rx.try_iter().collect()
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}
