//! Telemetry sources and the episode driver for RAN-RL
//!
//! This crate provides the environment side of the harness:
//! - Offline trace replay of recorded telemetry
//! - A closed-loop toy RAN environment for tests and demos
//! - The episode driver wiring sources into the learning pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod episode;
pub mod toy;
pub mod trace_source;

// Re-export the driver and sources
pub use episode::{EpisodeReport, EpisodeRunner, RunnerConfig};
pub use toy::ToyRanEnv;
pub use trace_source::TraceSource;

// Re-export core types
pub use ran_rl_core::{
    ActionAssignment, TelemetryField, TelemetryRecord, TelemetrySnapshot, TelemetrySource, UserId,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{EpisodeRunner, RunnerConfig, ToyRanEnv, TraceSource};
    pub use ran_rl_core::prelude::*;
}
