//! Session configuration
//!
//! Settings come from a `key: value` text file (the same format a session
//! writes to `setting.txt`, so a previous run can be replayed), from JSON, or
//! from individual overrides. Everything is validated once, before a session
//! creates files or spawns threads.

use crate::acquisition::channels::ChannelSet;
use crate::acquisition::engine::AcquisitionSettings;
use crate::acquisition::timing::block_duration;
use crate::export::display::DEFAULT_DISPLAY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from parsing or validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing value for '{0}'")]
    MissingValue(String),

    #[error("'{key}' must be a positive integer, got '{value}'")]
    NotPositiveInteger { key: String, value: String },

    #[error("invalid channel index '{0}'")]
    InvalidChannel(String),

    #[error("channel list is empty")]
    EmptyChannelList,

    #[error("channel {0} listed more than once")]
    DuplicateChannel(u32),

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("line {line}: expected 'key: value', got '{text}'")]
    MalformedLine { line: usize, text: String },

    #[error("invalid save file name '{0}'")]
    InvalidFileName(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_device() -> String {
    "dev0".to_string()
}

fn default_channel() -> Vec<u32> {
    vec![0, 1]
}

fn default_data_length() -> usize {
    crate::DEFAULT_DATA_LENGTH
}

fn default_sampling_rate() -> u32 {
    crate::DEFAULT_SAMPLING_RATE
}

fn default_read_samples() -> usize {
    crate::DEFAULT_READ_SAMPLES
}

fn default_save_file_dir() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_save_file_name() -> String {
    "measured_data.csv".to_string()
}

fn default_export_period_ms() -> u64 {
    crate::DEFAULT_EXPORT_PERIOD_MS
}

fn default_display_capacity() -> usize {
    DEFAULT_DISPLAY_CAPACITY
}

/// Parse a strictly positive integer setting
fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialOrd,
{
    match value.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::NotPositiveInteger {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Measurement settings for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hardware device identifier
    #[serde(default = "default_device")]
    pub device: String,
    /// Channel indices in export column order
    #[serde(default = "default_channel")]
    pub channel: Vec<u32>,
    /// Ring buffer capacity per channel (samples)
    #[serde(default = "default_data_length")]
    pub data_length: usize,
    /// Sampling rate in Hz
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    /// Samples per channel per hardware read
    #[serde(default = "default_read_samples")]
    pub read_samples: usize,
    /// Root directory; each session gets a timestamped subdirectory
    #[serde(default = "default_save_file_dir")]
    pub save_file_dir: PathBuf,
    /// Data file name inside the session directory
    #[serde(default = "default_save_file_name")]
    pub save_file_name: String,
    /// Export period in milliseconds
    #[serde(default = "default_export_period_ms")]
    pub export_period_ms: u64,
    /// Maximum rows held for the live display
    #[serde(default = "default_display_capacity")]
    pub display_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            channel: default_channel(),
            data_length: default_data_length(),
            sampling_rate: default_sampling_rate(),
            read_samples: default_read_samples(),
            save_file_dir: default_save_file_dir(),
            save_file_name: default_save_file_name(),
            export_period_ms: default_export_period_ms(),
            display_capacity: default_display_capacity(),
        }
    }
}

impl SessionConfig {
    /// Apply one `key`/`value` setting
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::MissingValue(key.to_string()));
        }
        match key {
            "device" => self.device = value.to_string(),
            "channel" => self.channel = ChannelSet::from_str(value)?.indices().to_vec(),
            "data_length" => self.data_length = parse_positive(key, value)?,
            "sampling_rate" => self.sampling_rate = parse_positive(key, value)?,
            "read_samples" => self.read_samples = parse_positive(key, value)?,
            "save_file_dir" => self.save_file_dir = PathBuf::from(value),
            "save_file_name" => self.save_file_name = value.to_string(),
            "export_period_ms" => self.export_period_ms = parse_positive(key, value)?,
            "display_capacity" => self.display_capacity = parse_positive(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Parse `key: value` lines on top of the defaults
    ///
    /// Blank lines and lines starting with `#` are ignored. Only the first
    /// colon separates key and value, so Windows paths are fine.
    pub fn from_settings_text(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| ConfigError::MalformedLine {
                line: i + 1,
                text: line.to_string(),
            })?;
            config.set(key.trim(), value)?;
        }
        Ok(config)
    }

    /// Load from a `.json` file or a `key: value` settings file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            Self::from_settings_text(&contents)?
        };
        tracing::info!(path = %path.display(), "Loaded session config");
        Ok(config)
    }

    /// Dump as `key: value` lines, readable by [`Self::from_settings_text`]
    pub fn to_settings_text(&self) -> String {
        let channels: Vec<String> = self.channel.iter().map(|c| c.to_string()).collect();
        let mut out = String::new();
        let _ = writeln!(out, "device: {}", self.device);
        let _ = writeln!(out, "channel: {}", channels.join(","));
        let _ = writeln!(out, "data_length: {}", self.data_length);
        let _ = writeln!(out, "sampling_rate: {}", self.sampling_rate);
        let _ = writeln!(out, "read_samples: {}", self.read_samples);
        let _ = writeln!(out, "save_file_dir: {}", self.save_file_dir.display());
        let _ = writeln!(out, "save_file_name: {}", self.save_file_name);
        let _ = writeln!(out, "export_period_ms: {}", self.export_period_ms);
        let _ = writeln!(out, "display_capacity: {}", self.display_capacity);
        out
    }

    /// Check every setting, returning the validated channel set
    pub fn validate(&self) -> Result<ChannelSet, ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::MissingValue("device".into()));
        }
        let channels = ChannelSet::new(self.channel.clone())?;

        let numeric = [
            ("data_length", self.data_length as u64),
            ("sampling_rate", self.sampling_rate as u64),
            ("read_samples", self.read_samples as u64),
            ("export_period_ms", self.export_period_ms),
            ("display_capacity", self.display_capacity as u64),
        ];
        if let Some((key, value)) = numeric.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NotPositiveInteger {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        if self.save_file_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("save_file_dir".into()));
        }
        let name = self.save_file_name.trim();
        if name.is_empty() {
            return Err(ConfigError::MissingValue("save_file_name".into()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidFileName(self.save_file_name.clone()));
        }

        if self.data_length < self.read_samples {
            tracing::warn!(
                data_length = self.data_length,
                read_samples = self.read_samples,
                "Ring buffer smaller than one block; every push will evict samples"
            );
        }
        Ok(channels)
    }

    /// Validated acquisition parameters
    pub fn acquisition_settings(&self) -> Result<AcquisitionSettings, ConfigError> {
        let channels = self.validate()?;
        Ok(AcquisitionSettings::new(
            &self.device,
            channels,
            self.sampling_rate,
            self.read_samples,
        ))
    }

    /// Time covered by one hardware read
    pub fn block_duration(&self) -> Duration {
        block_duration(self.read_samples, self.sampling_rate)
    }

    pub fn export_period(&self) -> Duration {
        Duration::from_millis(self.export_period_ms)
    }
}
