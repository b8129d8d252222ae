//! Centralized learning agent
//!
//! One agent controls every user: action selection is per user, but all user
//! transitions pool into one shared replay memory and train one shared
//! network pair.

use std::path::Path;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use ran_rl_core::{
    ActionSet, AgentConfig, DiscreteAction, Result, RlError, StateMask, StateVector,
};

use crate::buffer::Transition;
use crate::learner::DoubleQLearner;
use crate::network::QNetworkConfig;
use crate::policy::AgentPolicy;
use crate::shaper::ShapedReward;
use crate::trace::{LearningTrace, UserTraceSample};

/// Action selection result for one user
#[derive(Debug, Clone)]
pub struct ChosenAction {
    /// The action to apply
    pub action: DiscreteAction,
    /// Q-values of the (masked) state it was chosen in
    pub q_values: Array1<f32>,
}

/// Double-Q learning agent shared across all controlled users
#[derive(Debug)]
pub struct RanAgent {
    config: AgentConfig,
    actions: ActionSet,
    mask: StateMask,
    policy: AgentPolicy,
    learner: DoubleQLearner,
    trace: LearningTrace,
    rng: StdRng,
    /// Masked states from the previous update, one per user
    states: Vec<Option<Array1<f32>>>,
    /// Actions recorded at the previous update, one per user
    actions_taken: Vec<Option<DiscreteAction>>,
}

impl RanAgent {
    /// Create an agent with every state dimension fed to the network
    pub fn new(
        config: AgentConfig,
        state_dim: usize,
        actions: ActionSet,
        policy: AgentPolicy,
    ) -> Result<Self> {
        Self::with_mask(config, StateMask::all(state_dim), actions, policy)
    }

    /// Create an agent learning only from the masked state dimensions
    pub fn with_mask(
        config: AgentConfig,
        mask: StateMask,
        actions: ActionSet,
        policy: AgentPolicy,
    ) -> Result<Self> {
        config.validate()?;
        policy.validate(&actions)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let network_config = QNetworkConfig::new(mask.learning_dim(), actions.len());
        let learner = DoubleQLearner::new(network_config, &config, &mut rng)?;
        let trace = LearningTrace::new(
            config.user_num,
            mask.state_dim(),
            actions.len(),
            config.total_steps(),
        )?;
        let user_num = config.user_num;
        Ok(Self {
            config,
            actions,
            mask,
            policy,
            learner,
            trace,
            rng,
            states: vec![None; user_num],
            actions_taken: vec![None; user_num],
        })
    }

    /// Clear per-episode transient state; traces and networks are kept
    pub fn reset(&mut self) {
        self.states = vec![None; self.config.user_num];
        self.actions_taken = vec![None; self.config.user_num];
    }

    /// The learning trace
    #[must_use]
    pub fn trace(&self) -> &LearningTrace {
        &self.trace
    }

    /// The underlying learner
    #[must_use]
    pub fn learner(&self) -> &DoubleQLearner {
        &self.learner
    }

    /// The configured action set
    #[must_use]
    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// The policy the agent selects actions with
    #[must_use]
    pub fn policy(&self) -> AgentPolicy {
        self.policy
    }

    /// Number of controlled users
    #[must_use]
    pub fn user_num(&self) -> usize {
        self.config.user_num
    }

    /// Sample a uniformly random action per user (first-step bootstrap)
    pub fn random_actions(&mut self) -> Vec<DiscreteAction> {
        (0..self.config.user_num)
            .map(|_| self.actions.sample(&mut self.rng))
            .collect()
    }

    /// Choose one action per user for the given states
    ///
    /// With probability `temp` the action is uniformly random, otherwise the
    /// argmax of the primary network's Q-values; the temperature is an
    /// exploration probability, not a softmax scale. Baseline policies
    /// replace the choice but the Q-values are still computed and reported
    /// for the trace.
    pub fn select_actions(&mut self, states: &[StateVector], temp: f64) -> Result<Vec<ChosenAction>> {
        if !(0.0..=1.0).contains(&temp) {
            return Err(RlError::Precondition(format!(
                "temperature {temp} outside [0, 1]"
            )));
        }
        if states.len() != self.config.user_num {
            return Err(RlError::DimensionMismatch {
                expected: self.config.user_num,
                actual: states.len(),
            });
        }

        let mut chosen = Vec::with_capacity(states.len());
        for state in states {
            let learning_state = self.mask.project(state)?;
            let q_values = self.learner.primary().forward(&learning_state.view());

            let action = match self.policy {
                AgentPolicy::Learned => {
                    if self.rng.gen::<f64>() < temp {
                        self.actions.sample(&mut self.rng)
                    } else {
                        DiscreteAction(argmax(&q_values))
                    }
                }
                AgentPolicy::Random => self.actions.sample(&mut self.rng),
                AgentPolicy::Fixed(index) => DiscreteAction(index),
            };
            chosen.push(ChosenAction { action, q_values });
        }
        Ok(chosen)
    }

    /// Record one step and, when training, store transitions and learn
    ///
    /// `chosen` are this step's actions, `rewards` the shaped rewards the
    /// *previous* actions produced, `states` the freshly normalized full
    /// states. Transitions are stored only once a previous state exists, one
    /// per user, into the shared replay memory; a learning step runs as soon
    /// as the memory is full.
    pub fn update(
        &mut self,
        chosen: &[ChosenAction],
        rewards: &[ShapedReward],
        states: &[StateVector],
        temp: f64,
        train: bool,
    ) -> Result<()> {
        let user_num = self.config.user_num;
        if chosen.len() != user_num || rewards.len() != user_num || states.len() != user_num {
            return Err(RlError::DimensionMismatch {
                expected: user_num,
                actual: chosen.len().min(rewards.len()).min(states.len()),
            });
        }

        if let Some(choice) = chosen.iter().find(|c| !self.actions.contains(c.action)) {
            return Err(RlError::Precondition(format!(
                "chosen action {} outside the {}-action set",
                choice.action.0,
                self.actions.len()
            )));
        }

        let samples: Vec<UserTraceSample> = chosen
            .iter()
            .zip(rewards)
            .zip(states)
            .map(|((choice, shaped), state)| UserTraceSample {
                state: state.clone(),
                action_one_hot: self.actions.one_hot(choice.action),
                q_values: choice.q_values.clone(),
                reward: shaped.reward.0 as f32,
                qos_satisfied: shaped.qos_satisfied,
                action_penalty: shaped.action_penalty as f32,
            })
            .collect();
        let idx = self.trace.record_step(&samples, temp as f32)?;

        // Rotate the transition bookkeeping: what was current becomes old
        let old_states = std::mem::take(&mut self.states);
        let old_actions = std::mem::take(&mut self.actions_taken);

        let new_states: Vec<Array1<f32>> = states
            .iter()
            .map(|s| self.mask.project(s))
            .collect::<Result<_>>()?;

        self.states = new_states.iter().cloned().map(Some).collect();
        self.actions_taken = chosen.iter().map(|c| Some(c.action)).collect();

        if train {
            // A transition needs a previous state: (s_{t-1}, a_{t-1}, r_t, s_t)
            if old_states.iter().all(Option::is_some) {
                for user in 0..user_num {
                    let state = old_states[user].clone().expect("checked above");
                    let action = old_actions[user].ok_or_else(|| {
                        RlError::Precondition(format!(
                            "user {user} has a previous state but no previous action"
                        ))
                    })?;
                    self.learner.store_transition(Transition {
                        state,
                        action,
                        reward: rewards[user].reward.0 as f32,
                        next_state: new_states[user].clone(),
                    })?;
                }
            }

            if self.learner.ready() {
                let loss = self.learner.step(&mut self.rng)?;
                self.trace.record_loss(idx, loss as f32)?;
                debug!(idx, loss, "recorded learning step");
            }
        }

        Ok(())
    }

    /// Persist the learning trace and the network parameters into `dir`
    pub async fn save(&self, dir: &Path) -> Result<()> {
        self.trace.save(dir).await?;
        self.learner.save_model(dir).await?;
        Ok(())
    }

    /// Restore the learning trace and the network parameters from `dir`
    ///
    /// The restored cursor positions subsequent appends exactly where the
    /// saved run left off.
    pub async fn load(&mut self, dir: &Path) -> Result<()> {
        self.trace.load(dir).await?;
        self.learner.load_model(dir).await?;
        Ok(())
    }
}

/// Index of the largest Q-value
fn argmax(q_values: &Array1<f32>) -> usize {
    q_values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
