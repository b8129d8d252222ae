//! Closed-loop toy RAN environment for tests and demos
//!
//! A three-position chain per user. The middle position is the only one
//! meeting the delay SLA, so shaped rewards follow a fixed per-position
//! table: low, high, low. Actions move along the chain (stay, decrement,
//! increment), with invalid moves clamped at the ends.

use async_trait::async_trait;

use ran_rl_core::{
    ActionAssignment, ActionSet, QosBonus, Result, RewardConfig, RlError, StateConfig,
    NormalizationTable, TelemetryField, TelemetryRecord, TelemetrySnapshot, TelemetrySource,
    UserId,
};

/// Delay reported from the SLA-meeting middle position
const GOOD_DELAY: f64 = 10.0;
/// Delay reported from the edge positions, violating the SLA
const BAD_DELAY: f64 = 90.0;
/// SLA delay bound
const DELAY_REQUIREMENT: f64 = 50.0;

/// Toy chain environment implementing [`TelemetrySource`]
#[derive(Debug)]
pub struct ToyRanEnv {
    positions: Vec<u8>,
    step_num: usize,
    step: usize,
}

impl ToyRanEnv {
    /// Create a toy environment with every user starting mid-chain
    pub fn new(user_num: usize, step_num: usize) -> Result<Self> {
        if user_num == 0 || step_num == 0 {
            return Err(RlError::Config(
                "toy environment needs users and steps".into(),
            ));
        }
        Ok(Self {
            positions: vec![1; user_num],
            step_num,
            step: 0,
        })
    }

    /// Chain position of one user, for assertions
    #[must_use]
    pub fn position(&self, user: usize) -> u8 {
        self.positions[user]
    }

    /// State layout observing the chain position (via SINR) and delivery
    pub fn state_config() -> Result<StateConfig> {
        let table = NormalizationTable::ran_defaults();
        StateConfig::from_names(&["sinr"], &[("app_rx_data", "app_tx_data")], &table)
    }

    /// The {stay, decrement, increment} action set
    pub fn action_set() -> Result<ActionSet> {
        ActionSet::new(vec![0, 1, 2], vec![0.0, 0.0, 1.0])
    }

    /// Reward shaping matching the chain's SLA synthesis
    ///
    /// With `alpha = 1` the shaped reward is exactly the per-position table:
    /// +1 mid-chain (for zero-penalty actions), -1 at the edges.
    #[must_use]
    pub fn reward_config() -> RewardConfig {
        RewardConfig {
            prr_numerator: TelemetryField::AppRxData,
            prr_denominator: TelemetryField::AppTxData,
            delay_field: TelemetryField::AppDelayMax,
            delay_requirement: DELAY_REQUIREMENT,
            prr_requirement: 0.99,
            alpha: 1.0,
            qos_bonus: QosBonus::Delay,
        }
    }

    fn synthesize(&self, user: usize) -> TelemetryRecord {
        let position = self.positions[user];
        let delay = if position == 1 { GOOD_DELAY } else { BAD_DELAY };
        TelemetryRecord::new(UserId(user as u32 + 1))
            .with(TelemetryField::Sinr, f64::from(position) * 30.0)
            .with(TelemetryField::AppDelayMax, delay)
            .with(TelemetryField::AppTxData, 100.0)
            .with(TelemetryField::AppRxData, 100.0)
    }
}

#[async_trait]
impl TelemetrySource for ToyRanEnv {
    async fn reset(&mut self) -> Result<()> {
        self.positions.fill(1);
        self.step = 0;
        Ok(())
    }

    async fn next_snapshot(&mut self) -> Result<Option<TelemetrySnapshot>> {
        if self.step >= self.step_num {
            return Ok(None);
        }
        self.step += 1;
        Ok(Some(
            (0..self.positions.len())
                .map(|user| self.synthesize(user))
                .collect(),
        ))
    }

    async fn deliver_actions(&mut self, assignments: &[ActionAssignment]) -> Result<()> {
        for assignment in assignments {
            let user = assignment.imsi.0 as usize;
            if user == 0 || user > self.positions.len() {
                return Err(RlError::Telemetry(format!(
                    "action for unknown toy user {}",
                    assignment.imsi
                )));
            }
            let position = &mut self.positions[user - 1];
            match assignment.label {
                0 => {}
                1 => *position = position.saturating_sub(1),
                2 => *position = (*position + 1).min(2),
                other => {
                    return Err(RlError::Telemetry(format!(
                        "unknown toy action label {other}"
                    )))
                }
            }
        }
        Ok(())
    }
}
