//! Live display buffer
//!
//! The export thread appends every exported row here; a front-end polls and
//! clears it on its own schedule. If nobody polls, the buffer is capped and
//! the oldest rows are dropped so memory stays bounded.

use crate::acquisition::ring::Row;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default maximum number of rows held for the front-end
pub const DEFAULT_DISPLAY_CAPACITY: usize = 100_000;

/// Thread-safe poll-and-clear buffer of exported rows
#[derive(Debug)]
pub struct DisplayBuffer {
    rows: Mutex<VecDeque<Row>>,
    max_rows: usize,
    dropped: AtomicU64,
    // Set while rows are being dropped, cleared by the next take
    overflowing: AtomicBool,
}

impl DisplayBuffer {
    /// Create a buffer holding at most `max_rows` rows (minimum 1)
    pub fn new(max_rows: usize) -> Self {
        let max_rows = max_rows.max(1);
        Self {
            rows: Mutex::new(VecDeque::with_capacity(max_rows.min(DEFAULT_DISPLAY_CAPACITY))),
            max_rows,
            dropped: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Row>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append exported rows, dropping the oldest beyond capacity
    pub fn extend(&self, rows: &[Row]) {
        let mut buffer = self.lock();
        buffer.extend(rows.iter().cloned());

        let overflow = buffer.len().saturating_sub(self.max_rows);
        if overflow > 0 {
            buffer.drain(..overflow);
            self.dropped.fetch_add(overflow as u64, Ordering::Relaxed);
            if !self.overflowing.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    max_rows = self.max_rows,
                    "Display buffer full, dropping oldest rows (front-end not polling?)"
                );
            }
        }
    }

    /// Take every buffered row, leaving the buffer empty
    pub fn take(&self) -> Vec<Row> {
        let rows = self.lock().drain(..).collect();
        self.overflowing.store(false, Ordering::Relaxed);
        rows
    }

    /// Take buffered rows, sleeping `backoff` first if there are none
    pub fn poll(&self, backoff: Duration) -> Vec<Row> {
        let rows = self.take();
        if !rows.is_empty() {
            return rows;
        }
        std::thread::sleep(backoff);
        self.take()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Rows dropped because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn rows(range: std::ops::Range<usize>) -> Vec<Row> {
        range
            .map(|i| Row {
                timestamp: i as f64,
                values: vec![i as f64],
            })
            .collect()
    }

    #[test]
    fn test_take_clears() {
        let display = DisplayBuffer::default();
        display.extend(&rows(0..5));
        assert_eq!(display.len(), 5);

        let taken = display.take();
        assert_eq!(taken.len(), 5);
        assert!(display.is_empty());
        assert!(display.take().is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let display = DisplayBuffer::new(3);
        display.extend(&rows(0..5));

        let taken = display.take();
        assert_eq!(
            taken.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            vec![2.0, 3.0, 4.0]
        );
        assert_eq!(display.dropped(), 2);
    }

    #[test]
    fn test_poll_waits_for_rows() {
        let display = Arc::new(DisplayBuffer::default());
        let writer = Arc::clone(&display);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            writer.extend(&rows(0..2));
        });

        let polled = display.poll(Duration::from_millis(200));
        handle.join().unwrap();
        assert_eq!(polled.len(), 2);
    }
}
