//! Double Q-Learning update rule
//!
//! The primary network chooses the bootstrapped next action; the target
//! network values it. The two roles are never collapsed onto one network;
//! that decorrelation is what distinguishes this from vanilla DQN.

use std::path::Path;

use ndarray::Array1;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ran_rl_core::{AgentConfig, Result, RlError};

use crate::buffer::{ReplayMemory, Transition};
use crate::network::{Adam, QNetwork, QNetworkConfig};

/// Serialized network parameters
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    network: QNetwork,
}

/// Replay-backed Double-DQN learner over a primary/target network pair
#[derive(Debug)]
pub struct DoubleQLearner {
    primary: QNetwork,
    target: QNetwork,
    optimizer: Adam,
    memory: ReplayMemory,
    gamma: f32,
    batch_size: usize,
    target_replace: usize,
    learn_step: usize,
}

impl DoubleQLearner {
    /// Name of the persisted model artifact
    pub const MODEL_FILE: &'static str = "model.json";

    /// Create a learner; the target starts as a copy of the primary
    pub fn new(
        network_config: QNetworkConfig,
        config: &AgentConfig,
        rng: &mut StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let primary = QNetwork::new(network_config, rng)?;
        let target = primary.clone();
        Ok(Self {
            primary,
            target,
            optimizer: Adam::new(config.learning_rate, config.eps, config.weight_decay),
            memory: ReplayMemory::new(config.memory_capacity)?,
            gamma: config.gamma as f32,
            batch_size: config.batch_size,
            target_replace: config.target_replace,
            learn_step: 0,
        })
    }

    /// Insert a transition into the replay memory
    ///
    /// State dimensions are checked against the network input; a mismatch is
    /// a caller bug.
    pub fn store_transition(&mut self, transition: Transition) -> Result<()> {
        let expected = self.primary.config().input_dim;
        if transition.state.len() != expected || transition.next_state.len() != expected {
            return Err(RlError::DimensionMismatch {
                expected,
                actual: transition.state.len(),
            });
        }
        self.memory.store(transition);
        Ok(())
    }

    /// Whether the replay memory has been filled at least once
    #[must_use]
    pub fn ready(&self) -> bool {
        self.memory.ready()
    }

    /// The replay memory
    #[must_use]
    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    /// The primary (acting) network
    #[must_use]
    pub fn primary(&self) -> &QNetwork {
        &self.primary
    }

    /// The target (valuation) network
    #[must_use]
    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    /// Number of learning steps performed so far
    #[must_use]
    pub fn learn_steps(&self) -> usize {
        self.learn_step
    }

    /// Sample a mini-batch and perform one gradient step on the primary
    ///
    /// Returns the mean squared TD error of the batch. Calling before
    /// [`DoubleQLearner::ready`] is a precondition violation.
    pub fn step(&mut self, rng: &mut StdRng) -> Result<f64> {
        if !self.memory.ready() {
            return Err(RlError::Precondition(format!(
                "learning step before the replay memory is full ({}/{})",
                self.memory.len(),
                self.memory.capacity()
            )));
        }

        self.learn_step += 1;

        let batch = self.memory.sample(self.batch_size, rng)?;
        let batch_len = batch.len() as f32;

        let mut grads = self.primary.zero_gradients();
        let mut loss_sum = 0.0_f64;

        for transition in batch {
            // Double-Q target: the primary selects, the target evaluates;
            // no gradient flows through either valuation
            let next_q_primary = self.primary.forward(&transition.next_state.view());
            let next_action = argmax(&next_q_primary);
            let next_q_target = self.target.forward(&transition.next_state.view());
            let target_value = transition.reward + self.gamma * next_q_target[next_action];

            let q_values = self.primary.forward(&transition.state.view());
            let td_error = q_values[transition.action.0] - target_value;
            loss_sum += f64::from(td_error) * f64::from(td_error);

            let mut output_grad = Array1::zeros(q_values.len());
            output_grad[transition.action.0] = 2.0 * td_error / batch_len;
            self.primary
                .accumulate_gradient(&transition.state.view(), &output_grad, &mut grads)?;
        }

        self.optimizer.step(&mut self.primary, &grads)?;

        let loss = loss_sum / f64::from(batch_len);
        metrics::counter!("ran_rl_learn_steps_total", 1);
        metrics::gauge!("ran_rl_batch_loss", loss);
        debug!(step = self.learn_step, loss, "learning step");

        if self.learn_step % self.target_replace == 0 {
            self.target.sync_from(&self.primary)?;
            debug!(step = self.learn_step, "target network synchronized");
        }

        Ok(loss)
    }

    /// Persist the primary network parameters into `dir`
    pub async fn save_model(&self, dir: &Path) -> Result<()> {
        let artifact = ModelArtifact {
            network: self.primary.clone(),
        };
        let json = serde_json::to_string(&artifact)?;
        tokio::fs::write(dir.join(Self::MODEL_FILE), json).await?;
        Ok(())
    }

    /// Restore both networks from a persisted model artifact
    ///
    /// The artifact's shape must match this learner's configuration.
    pub async fn load_model(&mut self, dir: &Path) -> Result<()> {
        let path = dir.join(Self::MODEL_FILE);
        info!(path = %path.display(), "loading learning model");
        let json = tokio::fs::read_to_string(&path).await?;
        let artifact: ModelArtifact = serde_json::from_str(&json)?;
        if artifact.network.config() != self.primary.config() {
            return Err(RlError::Config(
                "persisted model shape does not match the configured network".into(),
            ));
        }
        self.target.sync_from(&artifact.network)?;
        self.primary = artifact.network;
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rand::SeedableRng;
    use ran_rl_core::DiscreteAction;

    fn linear_config() -> QNetworkConfig {
        QNetworkConfig {
            input_dim: 1,
            hidden_dims: vec![],
            output_dim: 2,
        }
    }

    fn learner(capacity: usize, batch_size: usize, target_replace: usize) -> DoubleQLearner {
        let config = AgentConfig {
            memory_capacity: capacity,
            batch_size,
            target_replace,
            gamma: 0.9,
            learning_rate: 1e-3,
            ..AgentConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        DoubleQLearner::new(linear_config(), &config, &mut rng).unwrap()
    }

    fn transition(state: f32, action: usize, reward: f32, next_state: f32) -> Transition {
        Transition {
            state: arr1(&[state]),
            action: DiscreteAction(action),
            reward,
            next_state: arr1(&[next_state]),
        }
    }

    #[test]
    fn step_before_ready_is_a_precondition_error() {
        let mut learner = learner(4, 2, 10);
        let mut rng = StdRng::seed_from_u64(0);
        learner.store_transition(transition(0.1, 0, 0.5, 0.2)).unwrap();
        assert!(matches!(
            learner.step(&mut rng).unwrap_err(),
            RlError::Precondition(_)
        ));
    }

    #[test]
    fn stored_states_must_match_the_network_input() {
        let mut learner = learner(4, 2, 10);
        let bad = Transition {
            state: arr1(&[0.1, 0.2]),
            action: DiscreteAction(0),
            reward: 0.0,
            next_state: arr1(&[0.1, 0.2]),
        };
        assert!(matches!(
            learner.store_transition(bad).unwrap_err(),
            RlError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn double_q_target_selects_with_primary_and_values_with_target() {
        let mut learner = learner(2, 2, 1000);

        // Linear nets: q(x) = W x + b, parameters [w0, w1, b0, b1].
        // Primary prefers action 0 on positive states; the target would
        // prefer action 1 on its own argmax, which is exactly what vanilla
        // DQN would bootstrap from.
        learner.primary.set_parameters(&[1.0, -1.0, 0.0, 0.0]).unwrap();
        learner.target.set_parameters(&[0.0, 0.0, 2.0, 5.0]).unwrap();

        let gamma = 0.9_f32;
        let transitions = [transition(0.5, 0, 1.0, 0.7), transition(-0.4, 1, -1.0, 0.6)];
        for t in &transitions {
            learner.store_transition(t.clone()).unwrap();
        }

        // Expected targets: argmax by primary is action 0 (next states are
        // positive), valued by the target as 2.0, never 5.0.
        let expected_targets = [1.0 + gamma * 2.0, -1.0 + gamma * 2.0];
        let q_preds = [0.5_f32, 0.4]; // primary(s)[a]: [0.5,-0.5][0], [-0.4,0.4][1]
        let expected_loss: f64 = q_preds
            .iter()
            .zip(&expected_targets)
            .map(|(&q, &t)| f64::from(q - t) * f64::from(q - t))
            .sum::<f64>()
            / 2.0;

        let mut rng = StdRng::seed_from_u64(3);
        let loss = learner.step(&mut rng).unwrap();
        assert_relative_eq!(loss, expected_loss, epsilon = 1e-6);

        // The vanilla-DQN loss would bootstrap from the target's argmax
        let vanilla_targets = [1.0 + gamma * 5.0, -1.0 + gamma * 5.0];
        let vanilla_loss: f64 = q_preds
            .iter()
            .zip(&vanilla_targets)
            .map(|(&q, &t)| f64::from(q - t) * f64::from(q - t))
            .sum::<f64>()
            / 2.0;
        assert!((loss - vanilla_loss).abs() > 1e-3);
    }

    #[test]
    fn target_sync_cadence() {
        let target_replace = 3;
        let mut learner = learner(4, 2, target_replace);
        for i in 0..4 {
            learner
                .store_transition(transition(0.1 * i as f32, i % 2, 0.5, 0.2))
                .unwrap();
        }
        let initial_target = learner.target.parameters();
        let mut rng = StdRng::seed_from_u64(9);

        for step in 1..=target_replace {
            learner.step(&mut rng).unwrap();
            if step < target_replace {
                // Frozen between syncs even though the primary moves
                assert_eq!(learner.target.parameters(), initial_target);
                assert_ne!(learner.primary.parameters(), initial_target);
            }
        }
        assert_eq!(learner.target.parameters(), learner.primary.parameters());
    }

    #[tokio::test]
    async fn model_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut saved = learner(4, 2, 10);
        // Move the parameters off the seeded init so the round trip is visible
        let params: Vec<f32> = saved.primary.parameters().iter().map(|p| p + 0.25).collect();
        saved.primary.set_parameters(&params).unwrap();
        saved.save_model(dir.path()).await.unwrap();

        let mut restored = learner(4, 2, 10);
        assert_ne!(restored.primary.parameters(), saved.primary.parameters());
        restored.load_model(dir.path()).await.unwrap();
        assert_eq!(restored.primary.parameters(), saved.primary.parameters());
        assert_eq!(restored.target.parameters(), saved.primary.parameters());
    }

    #[tokio::test]
    async fn loading_a_mismatched_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let learner4 = learner(4, 2, 10);
        learner4.save_model(dir.path()).await.unwrap();

        let config = AgentConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut other = DoubleQLearner::new(
            QNetworkConfig::new(3, 2),
            &config,
            &mut rng,
        )
        .unwrap();
        assert!(matches!(
            other.load_model(dir.path()).await.unwrap_err(),
            RlError::Config(_)
        ));
    }
}
