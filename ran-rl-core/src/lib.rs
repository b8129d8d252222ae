//! Core types, telemetry schema and traits for the RAN-RL learning harness
//!
//! This crate provides the foundational abstractions shared by the learning
//! agent and the telemetry sources: the fixed telemetry schema with its
//! decode/encode boundary, state and action types, configuration objects,
//! exploration schedules and the error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod error;
pub mod reward;
pub mod schedule;
pub mod source;
pub mod state;
pub mod telemetry;

// Re-export core traits and types
pub use action::{ActionSet, DiscreteAction};
pub use config::{
    AgentConfig, FeatureSpec, NormRange, NormalizationTable, QosBonus, RewardConfig, StateConfig,
};
pub use error::{Result, RlError};
pub use reward::Reward;
pub use schedule::{ExponentialSchedule, LinearSchedule, Schedule, TemperatureSchedule};
pub use source::TelemetrySource;
pub use state::{StateMask, StateVector};
pub use telemetry::{
    ActionAssignment, TelemetryField, TelemetryRecord, TelemetrySnapshot, UserId, FIELD_COUNT,
    ROW_LEN,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionSet, AgentConfig, DiscreteAction, Result, RewardConfig, StateConfig, StateVector,
        TelemetryRecord, TelemetrySource, UserId,
    };
}
