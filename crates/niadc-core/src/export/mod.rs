//! Export module
//!
//! Consumer side of the pipeline:
//! - Append-only CSV sink ([`storage`])
//! - Poll-and-clear buffer for a live front-end ([`display`])
//! - Periodic drain-and-export thread ([`exporter`])

pub mod display;
pub mod exporter;
pub mod storage;
