//! Bounded per-channel sample queues
//!
//! One timestamp queue plus one queue per channel, all appended in lockstep.
//! Each queue holds at most `capacity` entries; the oldest entries are
//! overwritten on overflow, so every queue evicts the same number of entries
//! and lengths stay equal.

use ringbuf::traits::{Consumer, Observer, RingBuffer as _};
use ringbuf::HeapRb;
use thiserror::Error;

/// Errors from ring buffer construction and pushes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("ring buffer capacity must be greater than zero")]
    ZeroCapacity,

    #[error("ring buffer needs at least one channel")]
    NoChannels,

    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("length mismatch: {timestamps} timestamps but channel {channel} has {values} values")]
    LengthMismatch {
        timestamps: usize,
        channel: usize,
        values: usize,
    },
}

/// One exported row: timestamp followed by one value per channel
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Nanoseconds since the Unix epoch
    pub timestamp: f64,
    /// Values in channel order
    pub values: Vec<f64>,
}

/// Owned copy of the ring buffer contents taken by a drain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub timestamps: Vec<f64>,
    /// channels x samples
    pub channels: Vec<Vec<f64>>,
}

impl Snapshot {
    /// Number of samples (rows) in the snapshot
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Reshape column-major queues into rows, columns in channel order
    pub fn into_rows(self) -> Vec<Row> {
        let Snapshot {
            timestamps,
            channels,
        } = self;
        let mut columns: Vec<std::vec::IntoIter<f64>> =
            channels.into_iter().map(Vec::into_iter).collect();
        timestamps
            .into_iter()
            .map(|timestamp| Row {
                timestamp,
                values: columns.iter_mut().filter_map(Iterator::next).collect(),
            })
            .collect()
    }
}

/// Timestamp queue plus one bounded queue per channel
pub struct RingBuffer {
    timestamps: HeapRb<f64>,
    channels: Vec<HeapRb<f64>>,
    capacity: usize,
    evicted_total: u64,
}

impl RingBuffer {
    /// Create an empty buffer holding up to `capacity` samples per channel
    pub fn new(channel_count: usize, capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        if channel_count == 0 {
            return Err(RingBufferError::NoChannels);
        }
        Ok(Self {
            timestamps: HeapRb::new(capacity),
            channels: (0..channel_count).map(|_| HeapRb::new(capacity)).collect(),
            capacity,
            evicted_total: 0,
        })
    }

    /// Maximum samples held per channel
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Current number of samples per channel
    pub fn len(&self) -> usize {
        self.timestamps.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Samples dropped to overflow since creation
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    /// Append one value per channel for each timestamp
    ///
    /// Returns the number of entries evicted from each queue. The buffer is
    /// left untouched if the input is inconsistent.
    pub fn push(&mut self, timestamps: &[f64], values: &[Vec<f64>]) -> Result<usize, RingBufferError> {
        if values.len() != self.channels.len() {
            return Err(RingBufferError::ChannelMismatch {
                expected: self.channels.len(),
                actual: values.len(),
            });
        }
        if let Some((channel, column)) = values
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != timestamps.len())
        {
            return Err(RingBufferError::LengthMismatch {
                timestamps: timestamps.len(),
                channel,
                values: column.len(),
            });
        }
        if timestamps.is_empty() {
            return Ok(0);
        }

        let mut evicted = 0;
        for &t in timestamps {
            if self.timestamps.push_overwrite(t).is_some() {
                evicted += 1;
            }
        }
        for (queue, column) in self.channels.iter_mut().zip(values) {
            for &v in column {
                queue.push_overwrite(v);
            }
        }

        self.evicted_total += evicted as u64;
        Ok(evicted)
    }

    /// Move all contents out, leaving every queue empty
    pub fn drain(&mut self) -> Snapshot {
        Snapshot {
            timestamps: self.timestamps.pop_iter().collect(),
            channels: self
                .channels
                .iter_mut()
                .map(|queue| queue.pop_iter().collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: f64, n: usize, channels: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
        let ts: Vec<f64> = (0..n).map(|i| start + i as f64).collect();
        let values = (0..channels)
            .map(|c| ts.iter().map(|t| t * 10.0 + c as f64).collect())
            .collect();
        (ts, values)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RingBuffer::new(2, 0),
            Err(RingBufferError::ZeroCapacity)
        ));
        assert!(matches!(
            RingBuffer::new(0, 10),
            Err(RingBufferError::NoChannels)
        ));
    }

    #[test]
    fn test_push_below_capacity() {
        let mut ring = RingBuffer::new(2, 10).unwrap();
        let (ts, values) = block(0.0, 4, 2);
        assert_eq!(ring.push(&ts, &values).unwrap(), 0);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn test_length_is_min_of_total_and_capacity() {
        let mut ring = RingBuffer::new(3, 10).unwrap();
        let mut expected = 0;
        for k in 0..6 {
            let (ts, values) = block(k as f64 * 4.0, 4, 3);
            ring.push(&ts, &values).unwrap();
            expected = (expected + 4).min(10);
            assert_eq!(ring.len(), expected);
            for queue in &ring.channels {
                assert_eq!(queue.occupied_len(), expected);
            }
        }
        assert_eq!(ring.evicted_total(), 24 - 10);
    }

    #[test]
    fn test_oldest_entries_evicted() {
        let mut ring = RingBuffer::new(1, 5).unwrap();
        let (ts, values) = block(0.0, 8, 1);
        assert_eq!(ring.push(&ts, &values).unwrap(), 3);

        let snapshot = ring.drain();
        assert_eq!(snapshot.timestamps, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(snapshot.channels[0], vec![30.0, 40.0, 50.0, 60.0, 70.0]);
    }

    #[test]
    fn test_empty_push_is_noop() {
        let mut ring = RingBuffer::new(2, 5).unwrap();
        assert_eq!(ring.push(&[], &[vec![], vec![]]).unwrap(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_inconsistent_push_rejected() {
        let mut ring = RingBuffer::new(2, 5).unwrap();
        assert!(matches!(
            ring.push(&[1.0], &[vec![1.0]]),
            Err(RingBufferError::ChannelMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            ring.push(&[1.0, 2.0], &[vec![1.0, 2.0], vec![1.0]]),
            Err(RingBufferError::LengthMismatch { channel: 1, .. })
        ));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_drain_then_push() {
        let mut ring = RingBuffer::new(2, 10).unwrap();
        let (ts, values) = block(0.0, 6, 2);
        ring.push(&ts, &values).unwrap();

        let snapshot = ring.drain();
        assert_eq!(snapshot.len(), 6);
        assert!(ring.is_empty());

        ring.push(&ts, &values).unwrap();
        assert_eq!(ring.len(), 6);
    }

    #[test]
    fn test_snapshot_into_rows() {
        let snapshot = Snapshot {
            timestamps: vec![1.0, 2.0, 3.0],
            channels: vec![vec![10.0, 20.0, 30.0], vec![-1.0, -2.0, -3.0]],
        };
        let rows = snapshot.into_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1],
            Row {
                timestamp: 2.0,
                values: vec![20.0, -2.0]
            }
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let mut ring = RingBuffer::new(1, 3).unwrap();
        let snapshot = ring.drain();
        assert!(snapshot.is_empty());
        assert!(snapshot.into_rows().is_empty());
    }
}
