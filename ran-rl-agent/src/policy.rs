//! Agent policies: the learned policy and the non-learning baselines

use serde::{Deserialize, Serialize};

use ran_rl_core::{ActionSet, DiscreteAction, Result, RlError};

/// How the agent chooses actions each step
///
/// The baselines replace only the choice itself; trace recording, replay
/// storage and learning keep running through the same path, so baseline runs
/// produce directly comparable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPolicy {
    /// Epsilon-greedy over the primary network's Q-values
    Learned,
    /// Uniform random action every step
    Random,
    /// The same fixed action every step
    Fixed(usize),
}

impl AgentPolicy {
    /// Validate the policy against an action set
    pub fn validate(&self, actions: &ActionSet) -> Result<()> {
        if let AgentPolicy::Fixed(index) = *self {
            if !actions.contains(DiscreteAction(index)) {
                return Err(RlError::Config(format!(
                    "fixed policy action {index} outside the {}-action set",
                    actions.len()
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AgentPolicy {
    type Err = RlError;

    /// Parse `"dql"`, `"random"` or a fixed action index
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dql" => Ok(AgentPolicy::Learned),
            "random" => Ok(AgentPolicy::Random),
            other => other
                .parse::<usize>()
                .map(AgentPolicy::Fixed)
                .map_err(|_| RlError::Config(format!("unknown agent policy: {other}"))),
        }
    }
}
