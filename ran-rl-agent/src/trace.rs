//! Per-step learning traces and their persistence
//!
//! Fixed-length arrays allocated once for the whole run (`step_num *
//! episode_num` columns), mutated in place every step and persisted as one
//! JSON artifact per semantic name. Loading restores every array and the
//! cursor exactly.

use std::path::Path;

use ndarray::{Array1, Array2, Array3, Axis};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use ran_rl_core::{Result, RlError, StateVector};

/// One user's sample for one recorded step
#[derive(Debug, Clone)]
pub struct UserTraceSample {
    /// Full (unmasked) normalized state
    pub state: StateVector,
    /// One-hot encoding of the applied action
    pub action_one_hot: Array1<f32>,
    /// Q-values the primary network produced for the state
    pub q_values: Array1<f32>,
    /// Shaped reward
    pub reward: f32,
    /// Whether the SLA was met
    pub qos_satisfied: bool,
    /// Raw penalty of the applied action
    pub action_penalty: f32,
}

/// Fixed-capacity learning trace for every controlled user
#[derive(Debug, Clone, PartialEq)]
pub struct LearningTrace {
    user_num: usize,
    state_dim: usize,
    action_num: usize,
    /// `(user, state_dim, step)`
    state_data: Array3<f32>,
    /// `(user, action_num, step)`
    action_data: Array3<f32>,
    /// `(user, action_num, step)`
    q_value_data: Array3<f32>,
    /// `(user, step)`
    reward_data: Array2<f32>,
    /// `(user, step)`
    qos_data: Array2<f32>,
    /// `(user, step)`
    penalty_data: Array2<f32>,
    /// `(step,)`
    temperature_data: Array1<f32>,
    /// `(step,)`
    loss_data: Array1<f32>,
    data_idx: usize,
}

/// `(artifact file name, what it holds)` for every persisted array
const ARTIFACTS: [&str; 9] = [
    "states.json",
    "actions.json",
    "q_values.json",
    "rewards.json",
    "qos.json",
    "penalties.json",
    "temperatures.json",
    "losses.json",
    "data_idx.json",
];

impl LearningTrace {
    /// Allocate a trace for the full run
    pub fn new(
        user_num: usize,
        state_dim: usize,
        action_num: usize,
        total_steps: usize,
    ) -> Result<Self> {
        if user_num == 0 || state_dim == 0 || action_num == 0 || total_steps == 0 {
            return Err(RlError::Config("trace dimensions must be positive".into()));
        }
        Ok(Self {
            user_num,
            state_dim,
            action_num,
            state_data: Array3::zeros((user_num, state_dim, total_steps)),
            action_data: Array3::zeros((user_num, action_num, total_steps)),
            q_value_data: Array3::zeros((user_num, action_num, total_steps)),
            reward_data: Array2::zeros((user_num, total_steps)),
            qos_data: Array2::zeros((user_num, total_steps)),
            penalty_data: Array2::zeros((user_num, total_steps)),
            temperature_data: Array1::zeros(total_steps),
            loss_data: Array1::zeros(total_steps),
            data_idx: 0,
        })
    }

    /// Number of steps recorded so far (also the next write position)
    #[must_use]
    pub fn data_idx(&self) -> usize {
        self.data_idx
    }

    /// Total step capacity of the run
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.temperature_data.len()
    }

    /// Record one step for every user, returning the written column
    pub fn record_step(&mut self, users: &[UserTraceSample], temperature: f32) -> Result<usize> {
        if self.data_idx >= self.capacity() {
            return Err(RlError::Precondition(format!(
                "trace full after {} steps",
                self.capacity()
            )));
        }
        if users.len() != self.user_num {
            return Err(RlError::DimensionMismatch {
                expected: self.user_num,
                actual: users.len(),
            });
        }
        for sample in users {
            if sample.state.dim() != self.state_dim {
                return Err(RlError::DimensionMismatch {
                    expected: self.state_dim,
                    actual: sample.state.dim(),
                });
            }
            if sample.action_one_hot.len() != self.action_num
                || sample.q_values.len() != self.action_num
            {
                return Err(RlError::DimensionMismatch {
                    expected: self.action_num,
                    actual: sample.action_one_hot.len(),
                });
            }
        }

        let idx = self.data_idx;
        self.temperature_data[idx] = temperature;
        for (user, sample) in users.iter().enumerate() {
            self.state_data
                .slice_mut(ndarray::s![user, .., idx])
                .assign(sample.state.as_array());
            self.action_data
                .slice_mut(ndarray::s![user, .., idx])
                .assign(&sample.action_one_hot);
            self.q_value_data
                .slice_mut(ndarray::s![user, .., idx])
                .assign(&sample.q_values);
            self.reward_data[[user, idx]] = sample.reward;
            self.qos_data[[user, idx]] = if sample.qos_satisfied { 1.0 } else { 0.0 };
            self.penalty_data[[user, idx]] = sample.action_penalty;
        }
        self.data_idx += 1;
        Ok(idx)
    }

    /// Record the learning loss for an already-recorded column
    pub fn record_loss(&mut self, idx: usize, loss: f32) -> Result<()> {
        if idx >= self.data_idx {
            return Err(RlError::Precondition(format!(
                "loss for unrecorded step {idx} (recorded: {})",
                self.data_idx
            )));
        }
        self.loss_data[idx] = loss;
        Ok(())
    }

    /// Per-user rewards, `(user, step)`
    #[must_use]
    pub fn rewards(&self) -> &Array2<f32> {
        &self.reward_data
    }

    /// Per-step losses (0 where no learning step ran)
    #[must_use]
    pub fn losses(&self) -> &Array1<f32> {
        &self.loss_data
    }

    /// Per-step exploration temperatures
    #[must_use]
    pub fn temperatures(&self) -> &Array1<f32> {
        &self.temperature_data
    }

    /// Mean reward over users for each recorded step
    #[must_use]
    pub fn mean_rewards(&self) -> Array1<f32> {
        self.reward_data
            .slice(ndarray::s![.., ..self.data_idx])
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(0))
    }

    /// Mean QoS satisfaction over users for each recorded step
    #[must_use]
    pub fn mean_qos(&self) -> Array1<f32> {
        self.qos_data
            .slice(ndarray::s![.., ..self.data_idx])
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(0))
    }

    /// Persist every trace array and the cursor into `dir`
    pub async fn save(&self, dir: &Path) -> Result<()> {
        write_artifact(dir, ARTIFACTS[0], &self.state_data).await?;
        write_artifact(dir, ARTIFACTS[1], &self.action_data).await?;
        write_artifact(dir, ARTIFACTS[2], &self.q_value_data).await?;
        write_artifact(dir, ARTIFACTS[3], &self.reward_data).await?;
        write_artifact(dir, ARTIFACTS[4], &self.qos_data).await?;
        write_artifact(dir, ARTIFACTS[5], &self.penalty_data).await?;
        write_artifact(dir, ARTIFACTS[6], &self.temperature_data).await?;
        write_artifact(dir, ARTIFACTS[7], &self.loss_data).await?;
        write_artifact(dir, ARTIFACTS[8], &self.data_idx).await?;
        info!(dir = %dir.display(), steps = self.data_idx, "learning trace saved");
        Ok(())
    }

    /// Restore every trace array and the cursor from `dir`
    ///
    /// Artifact shapes must match this trace's allocation; subsequent appends
    /// continue from the restored cursor.
    pub async fn load(&mut self, dir: &Path) -> Result<()> {
        let state_data: Array3<f32> = read_artifact(dir, ARTIFACTS[0]).await?;
        let action_data: Array3<f32> = read_artifact(dir, ARTIFACTS[1]).await?;
        let q_value_data: Array3<f32> = read_artifact(dir, ARTIFACTS[2]).await?;
        let reward_data: Array2<f32> = read_artifact(dir, ARTIFACTS[3]).await?;
        let qos_data: Array2<f32> = read_artifact(dir, ARTIFACTS[4]).await?;
        let penalty_data: Array2<f32> = read_artifact(dir, ARTIFACTS[5]).await?;
        let temperature_data: Array1<f32> = read_artifact(dir, ARTIFACTS[6]).await?;
        let loss_data: Array1<f32> = read_artifact(dir, ARTIFACTS[7]).await?;
        let data_idx: usize = read_artifact(dir, ARTIFACTS[8]).await?;

        if state_data.raw_dim() != self.state_data.raw_dim()
            || action_data.raw_dim() != self.action_data.raw_dim()
            || q_value_data.raw_dim() != self.q_value_data.raw_dim()
            || reward_data.raw_dim() != self.reward_data.raw_dim()
            || qos_data.raw_dim() != self.qos_data.raw_dim()
            || penalty_data.raw_dim() != self.penalty_data.raw_dim()
            || temperature_data.raw_dim() != self.temperature_data.raw_dim()
            || loss_data.raw_dim() != self.loss_data.raw_dim()
        {
            return Err(RlError::Config(
                "persisted trace shapes do not match the configured run".into(),
            ));
        }
        if data_idx > self.capacity() {
            return Err(RlError::Config(format!(
                "persisted cursor {data_idx} exceeds trace capacity {}",
                self.capacity()
            )));
        }

        self.state_data = state_data;
        self.action_data = action_data;
        self.q_value_data = q_value_data;
        self.reward_data = reward_data;
        self.qos_data = qos_data;
        self.penalty_data = penalty_data;
        self.temperature_data = temperature_data;
        self.loss_data = loss_data;
        self.data_idx = data_idx;
        Ok(())
    }
}

async fn write_artifact<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    tokio::fs::write(dir.join(name), json).await?;
    Ok(())
}

async fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let json = tokio::fs::read_to_string(dir.join(name)).await?;
    Ok(serde_json::from_str(&json)?)
}
