//! Acquisition thread
//!
//! Owns the sample source and pushes timestamped blocks into the shared
//! [`DrainCoordinator`]. The thread only ever suspends inside the blocking
//! hardware read; while a drain is in flight it still reads, so the device
//! cadence is not disturbed, but the block is discarded.
//!
//! Any read error is fatal: the loop reports it on the session control, closes
//! the source and exits. Nothing is retried.

use super::channels::ChannelSet;
use super::gate::{DrainCoordinator, PushOutcome};
use super::source::SampleSource;
use super::timing::{block_duration, block_duration_ns, block_timestamps};
use crate::session::control::{Component, SessionControl};
use crate::session::{panic_message, SessionError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Read timeout as a multiple of the block duration
pub const READ_TIMEOUT_FACTOR: f64 = 2.0;

/// Parameters for one acquisition run
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    /// Hardware device identifier
    pub device: String,
    /// Channels to acquire, in export column order
    pub channels: ChannelSet,
    /// Sampling rate in Hz
    pub sampling_rate: u32,
    /// Samples per channel per hardware read
    pub read_samples: usize,
    /// Timeout for a single blocking read
    pub read_timeout: Duration,
}

impl AcquisitionSettings {
    /// Settings with the default read timeout
    pub fn new(device: &str, channels: ChannelSet, sampling_rate: u32, read_samples: usize) -> Self {
        let read_timeout = block_duration(read_samples, sampling_rate).mul_f64(READ_TIMEOUT_FACTOR);
        Self {
            device: device.to_string(),
            channels,
            sampling_rate,
            read_samples,
            read_timeout,
        }
    }

    /// Time covered by one block
    pub fn block_duration(&self) -> Duration {
        block_duration(self.read_samples, self.sampling_rate)
    }
}

/// Acquisition loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, source not opened yet
    Idle,
    /// Thread running, source open
    Running,
    /// Thread finished (terminal)
    Stopped,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }
}

/// Totals reported when the acquisition thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub blocks_read: u64,
    pub samples_enqueued: u64,
    pub blocks_skipped: u64,
}

/// Counters shared between the thread and its handle
#[derive(Default)]
struct AcquisitionCounters {
    state: AtomicU8,
    blocks_read: AtomicU64,
    samples_enqueued: AtomicU64,
    blocks_skipped: AtomicU64,
}

impl AcquisitionCounters {
    fn summary(&self) -> AcquisitionSummary {
        AcquisitionSummary {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            samples_enqueued: self.samples_enqueued.load(Ordering::Relaxed),
            blocks_skipped: self.blocks_skipped.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Producer side of the pipeline, not yet started
pub struct AcquisitionLoop {
    source: Box<dyn SampleSource>,
    settings: AcquisitionSettings,
    coordinator: Arc<DrainCoordinator>,
}

impl AcquisitionLoop {
    pub fn new(
        source: Box<dyn SampleSource>,
        settings: AcquisitionSettings,
        coordinator: Arc<DrainCoordinator>,
    ) -> Self {
        Self {
            source,
            settings,
            coordinator,
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Open the source and spawn the acquisition thread
    ///
    /// Open errors are returned synchronously; read errors surface through
    /// `control` and [`AcquisitionHandle::stop`].
    pub fn start(mut self, control: Arc<SessionControl>) -> Result<AcquisitionHandle, SessionError> {
        self.source.open(
            &self.settings.device,
            &self.settings.channels,
            self.settings.sampling_rate,
        )?;

        tracing::info!(
            source = self.source.name(),
            channels = %self.settings.channels.physical_spec(&self.settings.device),
            sampling_rate = self.settings.sampling_rate,
            read_samples = self.settings.read_samples,
            timeout_ms = self.settings.read_timeout.as_millis() as u64,
            "Acquisition starting"
        );

        let stop_flag = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(AcquisitionCounters::default());
        counters.set_state(LoopState::Running);

        let thread_stop = Arc::clone(&stop_flag);
        let thread_counters = Arc::clone(&counters);

        let thread = std::thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.run(&thread_stop, &control, &thread_counters)
                }))
                .unwrap_or_else(|panic| {
                    Err(SessionError::Panicked {
                        component: Component::Acquisition,
                        message: panic_message(panic),
                    })
                });

                if let Err(ref e) = result {
                    control.report(Component::Acquisition, e);
                }
                thread_counters.set_state(LoopState::Stopped);
                result
            })
            .map_err(SessionError::Spawn)?;

        Ok(AcquisitionHandle {
            stop_flag,
            counters,
            thread: Some(thread),
        })
    }

    fn run(
        mut self,
        stop_flag: &AtomicBool,
        control: &SessionControl,
        counters: &AcquisitionCounters,
    ) -> Result<AcquisitionSummary, SessionError> {
        let result = self.pump(stop_flag, control, counters);

        if let Err(e) = self.source.close() {
            tracing::warn!(error = %e, "Failed to close sample source");
        }

        let summary = counters.summary();
        tracing::info!(
            blocks = summary.blocks_read,
            samples = summary.samples_enqueued,
            skipped = summary.blocks_skipped,
            "Acquisition stopped"
        );
        result.map(|()| summary)
    }

    fn pump(
        &mut self,
        stop_flag: &AtomicBool,
        control: &SessionControl,
        counters: &AcquisitionCounters,
    ) -> Result<(), SessionError> {
        let n = self.settings.read_samples;
        let channel_count = self.settings.channels.len();
        let duration_ns = block_duration_ns(n, self.settings.sampling_rate);

        while !stop_flag.load(Ordering::Acquire) && !control.is_failed() {
            let block = self.source.read(n, self.settings.read_timeout)?;
            block.validate(channel_count, n)?;
            counters.blocks_read.fetch_add(1, Ordering::Relaxed);

            let timestamps = block_timestamps(block.start_ns, duration_ns, n);
            match self.coordinator.try_push(&timestamps, &block.channels)? {
                PushOutcome::Enqueued { evicted } => {
                    counters
                        .samples_enqueued
                        .fetch_add(n as u64, Ordering::Relaxed);
                    if evicted > 0 {
                        tracing::debug!(evicted, "Ring buffer full, oldest samples dropped");
                    }
                }
                PushOutcome::Skipped => {
                    counters.blocks_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(samples = n, "Block discarded during drain");
                }
            }
        }
        Ok(())
    }
}

/// Handle returned by [`AcquisitionLoop::start`] to observe and stop the thread
pub struct AcquisitionHandle {
    stop_flag: Arc<AtomicBool>,
    counters: Arc<AcquisitionCounters>,
    thread: Option<JoinHandle<Result<AcquisitionSummary, SessionError>>>,
}

impl AcquisitionHandle {
    /// Ask the thread to exit after its current read
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Stop the thread and wait for it to finish
    ///
    /// Returns the thread's fatal error, if any. Later calls return the
    /// final counters.
    pub fn stop(&mut self) -> Result<AcquisitionSummary, SessionError> {
        self.request_stop();
        match self.thread.take() {
            Some(h) => h.join().unwrap_or_else(|panic| {
                Err(SessionError::Panicked {
                    component: Component::Acquisition,
                    message: panic_message(panic),
                })
            }),
            None => Ok(self.counters.summary()),
        }
    }

    /// Check if the acquisition thread is still alive
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.counters.state.load(Ordering::Acquire))
    }

    /// Live counters
    pub fn summary(&self) -> AcquisitionSummary {
        self.counters.summary()
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
