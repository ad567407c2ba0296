//! Drain gate between the acquisition and export threads
//!
//! The ring buffer sits behind a mutex; a drain detaches its contents inside
//! one critical section, so both threads observe the drain as a single event.
//! On top of that, the `draining` flag lets the producer skip a block instead
//! of waiting on the mutex while a drain is copying the buffer out. Blocks
//! skipped this way are discarded and counted.

use super::ring::{RingBuffer, RingBufferError, Snapshot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Result of offering a block to the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Block appended; `evicted` oldest entries were dropped per queue
    Enqueued { evicted: usize },
    /// A drain was in flight; the block was discarded
    Skipped,
}

/// Sets the drain flag for its lifetime
struct GateGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Shared owner of the ring buffer and its drain gate
pub struct DrainCoordinator {
    draining: AtomicBool,
    ring: Mutex<RingBuffer>,
    skipped_blocks: AtomicU64,
    skipped_samples: AtomicU64,
}

impl DrainCoordinator {
    pub fn new(ring: RingBuffer) -> Self {
        Self {
            draining: AtomicBool::new(false),
            ring: Mutex::new(ring),
            skipped_blocks: AtomicU64::new(0),
            skipped_samples: AtomicU64::new(0),
        }
    }

    /// Create a coordinator around a fresh ring buffer
    pub fn with_capacity(channel_count: usize, capacity: usize) -> Result<Self, RingBufferError> {
        Ok(Self::new(RingBuffer::new(channel_count, capacity)?))
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        // Pushes validate before mutating, so a poisoned buffer is still consistent
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close_gate(&self) -> GateGuard<'_> {
        self.draining.store(true, Ordering::Release);
        GateGuard {
            flag: &self.draining,
        }
    }

    /// Producer side: append a block unless a drain is in flight
    ///
    /// Never waits on the gate. It can wait on the mutex only in the short
    /// window between reading a clear gate and a drainer taking the lock.
    pub fn try_push(
        &self,
        timestamps: &[f64],
        values: &[Vec<f64>],
    ) -> Result<PushOutcome, RingBufferError> {
        if self.draining.load(Ordering::Acquire) {
            self.skipped_blocks.fetch_add(1, Ordering::Relaxed);
            self.skipped_samples
                .fetch_add(timestamps.len() as u64, Ordering::Relaxed);
            return Ok(PushOutcome::Skipped);
        }
        let evicted = self.lock().push(timestamps, values)?;
        Ok(PushOutcome::Enqueued { evicted })
    }

    /// Consumer side: detach the buffer contents and leave it empty
    pub fn drain(&self) -> Snapshot {
        let _gate = self.close_gate();
        self.lock().drain()
    }

    /// True while a drain is copying the buffer out
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Samples currently buffered per channel
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Blocks discarded because a drain was in flight
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks.load(Ordering::Relaxed)
    }

    /// Samples discarded because a drain was in flight
    pub fn skipped_samples(&self) -> u64 {
        self.skipped_samples.load(Ordering::Relaxed)
    }

    /// Samples dropped to ring buffer overflow
    pub fn evicted_total(&self) -> u64 {
        self.lock().evicted_total()
    }
}
