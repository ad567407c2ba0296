//! NIADC - Continuous multi-channel analog acquisition with incremental CSV export
//!
//! This library re-exports the acquisition pipeline, configuration and
//! session lifecycle from `niadc-core`.

pub use niadc_core::acquisition;
pub use niadc_core::config;
pub use niadc_core::export;
pub use niadc_core::session;

pub use niadc_core::{
    DisplayBuffer, Session, SessionConfig, SessionError, SessionState, SessionSummary,
    SimulatedSource,
};
pub use niadc_core::{BUILD_DATE, VERSION};
