//! Acquisition module
//!
//! This module contains the producer side of the pipeline:
//! - Channel set validation and column naming ([`channels`])
//! - Block duration and per-sample timestamps ([`timing`])
//! - The hardware boundary and built-in sources ([`source`])
//! - Bounded per-channel queues ([`ring`])
//! - The drain gate shared with the export thread ([`gate`])
//! - The acquisition thread itself ([`engine`])

pub mod channels;
pub mod engine;
pub mod gate;
pub mod ring;
pub mod source;
pub mod timing;
