//! NIADC Core - Acquisition pipeline, ring buffer and incremental export
//!
//! This library continuously samples multi-channel analog voltage data from an
//! acquisition device, buffers it between a producer (hardware polling) thread
//! and a consumer (periodic export) thread, and appends it to a CSV file
//! without blocking acquisition.

pub mod acquisition;
pub mod config;
pub mod export;
pub mod session;

pub use acquisition::{
    channels::ChannelSet,
    engine::{AcquisitionHandle, AcquisitionLoop, AcquisitionSettings, LoopState},
    gate::{DrainCoordinator, PushOutcome},
    ring::{RingBuffer, Row, Snapshot},
    source::{SampleBlock, SampleSource, ScriptedSource, SimulatedSource, SourceError},
};
pub use config::{ConfigError, SessionConfig};
pub use export::{display::DisplayBuffer, exporter::ExportLoop, storage::Storage};
pub use session::{Session, SessionError, SessionState, SessionSummary};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default sampling rate in Hz
pub const DEFAULT_SAMPLING_RATE: u32 = 1000;

/// Default number of samples per hardware read
pub const DEFAULT_READ_SAMPLES: usize = 100;

/// Default ring buffer capacity per channel (samples)
pub const DEFAULT_DATA_LENGTH: usize = 10_000;

/// Default export period in milliseconds
pub const DEFAULT_EXPORT_PERIOD_MS: u64 = 1000;
