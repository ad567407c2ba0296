//! Block duration and per-sample timestamps
//!
//! A block of `n` samples starting at `t` covers exactly one block duration.
//! Sample instants are evenly spaced over the half-open interval
//! `[t, t + duration)`: the end point belongs to the next block.

use std::time::Duration;

/// Nanoseconds per second
pub const NANOS_PER_SEC: f64 = 1e9;

/// Time covered by one block of `block_size` samples at `sampling_rate` Hz
///
/// Zero for a zero sampling rate.
pub fn block_duration(block_size: usize, sampling_rate: u32) -> Duration {
    Duration::try_from_secs_f64(block_size as f64 / sampling_rate as f64).unwrap_or(Duration::ZERO)
}

/// Block duration in nanoseconds, without rounding to whole nanoseconds
pub fn block_duration_ns(block_size: usize, sampling_rate: u32) -> f64 {
    block_size as f64 * NANOS_PER_SEC / sampling_rate as f64
}

/// Timestamps for `n` samples of a block starting at `start_ns`
///
/// Each instant is computed from its index rather than by accumulating the
/// step, so there is no drift over long blocks.
pub fn block_timestamps(start_ns: i64, block_duration_ns: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let start = start_ns as f64;
    let n_f = n as f64;
    (0..n)
        .map(|i| start + (i as f64 * block_duration_ns) / n_f)
        .collect()
}

/// Current wall-clock time in nanoseconds since the Unix epoch
pub fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_half_open_spacing() {
        let ts = block_timestamps(1000, 10_000.0, 5);
        assert_eq!(ts, vec![1000.0, 3000.0, 5000.0, 7000.0, 9000.0]);
    }

    #[test]
    fn test_ten_millisecond_block() {
        let ts = block_timestamps(1000, 10_000_000.0, 5);
        assert_eq!(
            ts,
            vec![1000.0, 2_001_000.0, 4_001_000.0, 6_001_000.0, 8_001_000.0]
        );
    }

    #[test]
    fn test_last_instant_before_block_end() {
        let duration = block_duration_ns(100, 1000);
        let ts = block_timestamps(0, duration, 100);
        assert_eq!(ts.len(), 100);
        assert!(*ts.last().unwrap() < duration);
    }

    #[test]
    fn test_empty_block() {
        assert!(block_timestamps(5, 1000.0, 0).is_empty());
    }

    #[test]
    fn test_contiguous_blocks_do_not_drift() {
        // 1000 contiguous blocks of 100 samples at 1 kHz
        let duration = block_duration_ns(100, 1000);
        let step = duration / 100.0;
        let mut previous: Option<f64> = None;
        for block in 0..1000i64 {
            let start = block * duration as i64;
            for t in block_timestamps(start, duration, 100) {
                if let Some(p) = previous {
                    assert!(t > p);
                    assert_relative_eq!(t - p, step, max_relative = 1e-9);
                }
                previous = Some(t);
            }
        }
    }

    #[test]
    fn test_block_duration() {
        assert_eq!(block_duration(100, 1000), Duration::from_millis(100));
        assert_relative_eq!(block_duration_ns(100, 1000), 100_000_000.0);
    }
}
