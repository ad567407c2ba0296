//! Channel set for one acquisition session
//!
//! The device is read over the contiguous physical range `ai<min>:<max>`;
//! [`ChannelSet::select_from_range`] picks the configured channels out of
//! such a read, in configured order.

use crate::config::ConfigError;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Name of the timestamp column in exported data
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Highest analog input index accepted (`ai255`)
pub const MAX_CHANNEL_INDEX: u32 = 255;

/// Ordered set of distinct analog input channel indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    indices: Vec<u32>,
}

impl ChannelSet {
    /// Create a channel set, rejecting empty, duplicated or out-of-range lists
    pub fn new(indices: Vec<u32>) -> Result<Self, ConfigError> {
        if indices.is_empty() {
            return Err(ConfigError::EmptyChannelList);
        }
        let mut seen = HashSet::with_capacity(indices.len());
        for &ch in &indices {
            if ch > MAX_CHANNEL_INDEX {
                return Err(ConfigError::InvalidChannel(ch.to_string()));
            }
            if !seen.insert(ch) {
                return Err(ConfigError::DuplicateChannel(ch));
            }
        }
        Ok(Self { indices })
    }

    /// Channel indices in configured order
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of channels (always at least one)
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Lowest and highest channel index
    pub fn physical_range(&self) -> (u32, u32) {
        let min = self.indices.iter().copied().min().unwrap_or(0);
        let max = self.indices.iter().copied().max().unwrap_or(0);
        (min, max)
    }

    /// Number of channels in the contiguous physical range read from the device
    pub fn physical_width(&self) -> usize {
        let (min, max) = self.physical_range();
        (max - min) as usize + 1
    }

    /// Physical channel specification in driver notation, e.g. `dev0/ai0:3`
    pub fn physical_spec(&self, device: &str) -> String {
        let (min, max) = self.physical_range();
        if min == max {
            format!("{}/ai{}", device, min)
        } else {
            format!("{}/ai{}:{}", device, min, max)
        }
    }

    /// Pick the configured channels out of a contiguous range read
    ///
    /// `range` must hold one sequence per physical channel `min..=max`.
    /// Returns `None` if the range has the wrong width.
    pub fn select_from_range(&self, range: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
        if range.len() != self.physical_width() {
            return None;
        }
        let (min, _) = self.physical_range();
        let mut slots: Vec<Option<Vec<f64>>> = range.into_iter().map(Some).collect();
        self.indices
            .iter()
            .map(|&ch| slots[(ch - min) as usize].take())
            .collect()
    }

    /// Column names: `timestamp`, then `ch_<i>` per channel
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(self.indices.iter().map(|ch| format!("ch_{}", ch)))
            .collect()
    }
}

impl FromStr for ChannelSet {
    type Err = ConfigError;

    /// Parse a comma separated list such as `0,1,3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let indices = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidChannel(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(indices)
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indices.iter().map(|ch| ch.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
