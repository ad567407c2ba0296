//! Hardware sample source boundary
//!
//! [`SampleSource`] models a vendor driver that exposes a blocking
//! "read N samples with timeout" call. The source instance itself plays the
//! role of the driver task handle: `open` configures it, `read` blocks until
//! a full block is available, `close` releases it.
//!
//! Two sources ship with the crate:
//! - [`SimulatedSource`]: paced synthetic sine waves, gap-free block timing
//! - [`ScriptedSource`]: canned results for deterministic tests

use super::channels::ChannelSet;
use super::timing::{block_duration, block_duration_ns, now_ns};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors reported by a sample source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Fewer samples than requested arrived within the timeout.
    /// Short reads without a driver timeout are reported the same way.
    #[error("read timed out: requested {requested} samples, received {received}")]
    Timeout { requested: usize, received: usize },

    #[error("sample source is not open")]
    NotOpen,

    #[error("device error: {0}")]
    Device(String),
}

/// One hardware read: start timestamp plus one sample sequence per channel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    /// Timestamp of the first sample, nanoseconds since the Unix epoch
    pub start_ns: i64,
    /// Voltages, channels x samples, in configured channel order
    pub channels: Vec<Vec<f64>>,
}

impl SampleBlock {
    /// Number of samples per channel (length of the shortest channel)
    pub fn samples_per_channel(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Check that the block is complete
    ///
    /// A missing channel or any channel shorter than `block_size` is treated
    /// as a timeout: partial blocks cannot be given reliable timestamps.
    pub fn validate(&self, channel_count: usize, block_size: usize) -> Result<(), SourceError> {
        let received = if self.channels.len() == channel_count {
            self.samples_per_channel()
        } else {
            0
        };
        if received != block_size || self.channels.iter().any(|c| c.len() != block_size) {
            return Err(SourceError::Timeout {
                requested: block_size,
                received,
            });
        }
        Ok(())
    }
}

/// A blocking multi-channel sample source
pub trait SampleSource: Send {
    /// Configure the source for a channel set and sampling rate
    fn open(
        &mut self,
        device: &str,
        channels: &ChannelSet,
        sampling_rate: u32,
    ) -> Result<(), SourceError>;

    /// Block until `block_size` samples per channel are available
    fn read(&mut self, block_size: usize, timeout: Duration) -> Result<SampleBlock, SourceError>;

    /// Release the source
    fn close(&mut self) -> Result<(), SourceError>;

    /// Human readable source name for logs
    fn name(&self) -> &str {
        "source"
    }
}

/// Stream parameters captured at `open`
#[derive(Debug, Clone)]
struct SimulatedStream {
    channels: ChannelSet,
    sampling_rate: u32,
    opened_ns: i64,
    next_ready: Instant,
    blocks_served: u64,
    sample_index: u64,
}

/// Synthetic source producing one sine wave per physical channel
///
/// Blocks are contiguous: block `k` starts exactly `k` block durations after
/// the open time. When paced, `read` sleeps until the block would have been
/// fully acquired by real hardware.
pub struct SimulatedSource {
    amplitude: f64,
    frequency_hz: f64,
    paced: bool,
    fail_after: Option<u64>,
    stream: Option<SimulatedStream>,
}

impl SimulatedSource {
    /// Paced source: reads return at the device's natural cadence
    pub fn new() -> Self {
        Self {
            amplitude: 2.5,
            frequency_hz: 5.0,
            paced: true,
            fail_after: None,
            stream: None,
        }
    }

    /// Unpaced source: reads return immediately (for tests and benches)
    pub fn unpaced() -> Self {
        Self {
            paced: false,
            ..Self::new()
        }
    }

    /// Set sine amplitude (volts) and frequency (Hz)
    pub fn with_waveform(mut self, amplitude: f64, frequency_hz: f64) -> Self {
        self.amplitude = amplitude;
        self.frequency_hz = frequency_hz;
        self
    }

    /// Simulate a driver timeout after `blocks` successful reads
    pub fn fail_after(mut self, blocks: u64) -> Self {
        self.fail_after = Some(blocks);
        self
    }

    fn sample(&self, physical_channel: u32, index: u64, sampling_rate: u32) -> f64 {
        let t = index as f64 / sampling_rate as f64;
        let phase = physical_channel as f64 * std::f64::consts::FRAC_PI_4;
        self.amplitude * (2.0 * std::f64::consts::PI * self.frequency_hz * t + phase).sin()
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedSource {
    fn open(
        &mut self,
        device: &str,
        channels: &ChannelSet,
        sampling_rate: u32,
    ) -> Result<(), SourceError> {
        if sampling_rate == 0 {
            return Err(SourceError::Device("sampling rate must be positive".into()));
        }
        tracing::info!(
            channels = %channels.physical_spec(device),
            sampling_rate,
            paced = self.paced,
            "Simulated source opened"
        );
        self.stream = Some(SimulatedStream {
            channels: channels.clone(),
            sampling_rate,
            opened_ns: now_ns(),
            next_ready: Instant::now(),
            blocks_served: 0,
            sample_index: 0,
        });
        Ok(())
    }

    fn read(&mut self, block_size: usize, timeout: Duration) -> Result<SampleBlock, SourceError> {
        let paced = self.paced;
        let fail_after = self.fail_after;
        let stream = self.stream.as_mut().ok_or(SourceError::NotOpen)?;

        if fail_after.is_some_and(|n| stream.blocks_served >= n) {
            return Err(SourceError::Timeout {
                requested: block_size,
                received: 0,
            });
        }

        let duration = block_duration(block_size, stream.sampling_rate);
        if paced {
            let ready_at = stream.next_ready + duration;
            let wait = ready_at.saturating_duration_since(Instant::now());
            if wait > timeout {
                std::thread::sleep(timeout);
                let received = (timeout.as_secs_f64() * stream.sampling_rate as f64) as usize;
                return Err(SourceError::Timeout {
                    requested: block_size,
                    received: received.min(block_size),
                });
            }
            std::thread::sleep(wait);
            stream.next_ready = ready_at;
        }

        let duration_ns = block_duration_ns(block_size, stream.sampling_rate);
        let start_ns =
            stream.opened_ns + (stream.blocks_served as f64 * duration_ns).round() as i64;
        let first_index = stream.sample_index;
        let rate = stream.sampling_rate;
        let (min, max) = stream.channels.physical_range();
        let channels = stream.channels.clone();

        stream.blocks_served += 1;
        stream.sample_index += block_size as u64;

        let range: Vec<Vec<f64>> = (min..=max)
            .map(|ch| {
                (0..block_size as u64)
                    .map(|i| self.sample(ch, first_index + i, rate))
                    .collect()
            })
            .collect();
        let selected = channels
            .select_from_range(range)
            .ok_or_else(|| SourceError::Device("channel range mismatch".into()))?;

        Ok(SampleBlock {
            start_ns,
            channels: selected,
        })
    }

    fn close(&mut self) -> Result<(), SourceError> {
        match self.stream.take() {
            Some(stream) => {
                tracing::info!(blocks = stream.blocks_served, "Simulated source closed");
                Ok(())
            }
            None => Err(SourceError::NotOpen),
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Source replaying a fixed list of read results
///
/// Once the script is exhausted every read reports a timeout with zero
/// samples, which ends an acquisition session.
pub struct ScriptedSource {
    script: VecDeque<Result<SampleBlock, SourceError>>,
    read_delay: Option<Duration>,
    open: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    /// Create a source from canned read results
    pub fn new(script: impl IntoIterator<Item = Result<SampleBlock, SourceError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            read_delay: None,
            open: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a source from successful blocks only
    pub fn from_blocks(blocks: impl IntoIterator<Item = SampleBlock>) -> Self {
        Self::new(blocks.into_iter().map(Ok))
    }

    /// Sleep this long in each read, emulating a blocking driver
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Flag set once `close` has been called
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl SampleSource for ScriptedSource {
    fn open(&mut self, _: &str, _: &ChannelSet, _: u32) -> Result<(), SourceError> {
        self.open = true;
        Ok(())
    }

    fn read(&mut self, block_size: usize, _timeout: Duration) -> Result<SampleBlock, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.script.pop_front().unwrap_or(Err(SourceError::Timeout {
            requested: block_size,
            received: 0,
        }))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.open = false;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
