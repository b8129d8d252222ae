//! Double Q-Learning agent and data pipeline for RAN-RL
//!
//! This crate provides the learning side of the harness:
//! - Feature normalization and reward shaping from raw telemetry
//! - A ring-buffer replay memory with uniform sampling
//! - A primary/target Q-network pair trained by Double Q-Learning
//! - Per-user learning traces with exact save/load round trips
//! - The centralized agent orchestrating all of the above per step

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod buffer;
pub mod learner;
pub mod network;
pub mod normalizer;
pub mod policy;
pub mod shaper;
pub mod trace;

// Re-export the pipeline types
pub use agent::{ChosenAction, RanAgent};
pub use buffer::{ReplayMemory, Transition};
pub use learner::DoubleQLearner;
pub use network::{Adam, Gradients, QNetwork, QNetworkConfig};
pub use normalizer::FeatureNormalizer;
pub use policy::AgentPolicy;
pub use shaper::{RewardShaper, ShapedReward};
pub use trace::{LearningTrace, UserTraceSample};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentPolicy, FeatureNormalizer, RanAgent, ReplayMemory, RewardShaper, Transition,
    };
    pub use ran_rl_core::prelude::*;
}
