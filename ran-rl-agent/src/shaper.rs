//! Reward shaping: SLA check plus action-cost penalty

use ran_rl_core::{
    ActionSet, DiscreteAction, QosBonus, Result, Reward, RewardConfig, RlError, TelemetryRecord,
};

/// Shaped reward and diagnostics for one user and one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedReward {
    /// Scalar reward in [-1, 1]
    pub reward: Reward,
    /// Whether the delay/delivery SLA was met this step
    pub qos_satisfied: bool,
    /// Raw penalty of the applied action, for diagnostics
    pub action_penalty: f64,
}

/// Combines the per-user SLA check with the applied action's cost
///
/// Must be called with the action that produced the current telemetry: the
/// action applied in the *previous* step, not the one about to be chosen.
#[derive(Debug, Clone)]
pub struct RewardShaper {
    config: RewardConfig,
    penalties: Vec<f64>,
    max_penalty: f64,
}

impl RewardShaper {
    /// Create a shaper; fails fast on invalid reward configuration
    pub fn new(config: RewardConfig, actions: &ActionSet) -> Result<Self> {
        config.validate()?;
        let penalties = (0..actions.len())
            .map(|i| actions.penalty(DiscreteAction(i)))
            .collect();
        Ok(Self {
            config,
            penalties,
            max_penalty: actions.max_penalty(),
        })
    }

    /// Shape the reward for one user
    pub fn shape(&self, record: &TelemetryRecord, last_action: DiscreteAction) -> Result<ShapedReward> {
        let action_penalty = *self.penalties.get(last_action.0).ok_or_else(|| {
            RlError::Precondition(format!(
                "action index {} outside the {}-action set",
                last_action.0,
                self.penalties.len()
            ))
        })?;

        // Delivery ratio; no traffic yet counts as fully delivered
        let den = record.get(self.config.prr_denominator);
        let prr = if den <= 0.0 {
            1.0
        } else {
            record.get(self.config.prr_numerator) / den
        };
        let delay = record.get(self.config.delay_field);

        let qos_satisfied =
            delay < self.config.delay_requirement && prr >= self.config.prr_requirement;

        let (cost_penalty, qos_penalty) = if qos_satisfied {
            let cost = action_penalty / self.max_penalty;
            let qos = match self.config.qos_bonus {
                QosBonus::Delay => delay / self.config.delay_requirement,
                QosBonus::Prr => self.config.prr_requirement / prr,
            };
            (cost, qos)
        } else {
            (1.0, 1.0)
        };

        let alpha = self.config.alpha;
        let reward = 1.0 - alpha * cost_penalty - (1.0 - alpha) * qos_penalty;

        Ok(ShapedReward {
            reward: Reward(2.0 * (reward - 0.5)),
            qos_satisfied,
            action_penalty,
        })
    }

    /// Shape every user's reward in a snapshot
    ///
    /// `last_actions` must hold one entry per record, pairwise aligned.
    pub fn shape_snapshot(
        &self,
        snapshot: &[TelemetryRecord],
        last_actions: &[DiscreteAction],
    ) -> Result<Vec<ShapedReward>> {
        if snapshot.len() != last_actions.len() {
            return Err(RlError::DimensionMismatch {
                expected: snapshot.len(),
                actual: last_actions.len(),
            });
        }
        snapshot
            .iter()
            .zip(last_actions)
            .map(|(record, &action)| self.shape(record, action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ran_rl_core::{TelemetryField, UserId};

    fn actions() -> ActionSet {
        ActionSet::new(vec![1450, 1451, 1452], vec![0.0, 5.0, 35.0]).unwrap()
    }

    fn shaper(alpha: f64, qos_bonus: QosBonus) -> RewardShaper {
        let config = RewardConfig {
            prr_numerator: TelemetryField::AppRxData,
            prr_denominator: TelemetryField::AppTxData,
            delay_field: TelemetryField::AppDelayMax,
            delay_requirement: 50.0,
            prr_requirement: 0.99,
            alpha,
            qos_bonus,
        };
        RewardShaper::new(config, &actions()).unwrap()
    }

    fn satisfied_record() -> TelemetryRecord {
        TelemetryRecord::new(UserId(1))
            .with(TelemetryField::AppTxData, 100.0)
            .with(TelemetryField::AppRxData, 100.0)
            .with(TelemetryField::AppDelayMax, 10.0)
    }

    #[test]
    fn satisfied_zero_cost_full_alpha_is_max_reward() {
        let shaper = shaper(1.0, QosBonus::Delay);
        let shaped = shaper.shape(&satisfied_record(), DiscreteAction(0)).unwrap();
        assert!(shaped.qos_satisfied);
        assert_relative_eq!(shaped.reward.0, 1.0);
        assert_relative_eq!(shaped.action_penalty, 0.0);
    }

    #[test]
    fn violated_qos_is_min_reward() {
        let shaper = shaper(0.5, QosBonus::Delay);
        let record = satisfied_record().with(TelemetryField::AppDelayMax, 80.0);
        let shaped = shaper.shape(&record, DiscreteAction(2)).unwrap();
        assert!(!shaped.qos_satisfied);
        // 1 - 0.5*1 - 0.5*1 = 0, rescaled to -1
        assert_relative_eq!(shaped.reward.0, -1.0);
        assert_relative_eq!(shaped.action_penalty, 35.0);
    }

    #[test]
    fn delay_bonus_charges_consumed_budget() {
        let shaper = shaper(0.5, QosBonus::Delay);
        let shaped = shaper.shape(&satisfied_record(), DiscreteAction(0)).unwrap();
        // cost 0, qos penalty 10/50: 1 - 0.5*0.2 = 0.9, rescaled to 0.8
        assert_relative_eq!(shaped.reward.0, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn prr_bonus_charges_delivery_slack() {
        let shaper = shaper(0.5, QosBonus::Prr);
        let shaped = shaper.shape(&satisfied_record(), DiscreteAction(0)).unwrap();
        // qos penalty 0.99/1.0: 1 - 0.5*0.99 = 0.505, rescaled to 0.01
        assert_relative_eq!(shaped.reward.0, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn zero_denominator_counts_as_fully_delivered() {
        let shaper = shaper(0.5, QosBonus::Prr);
        let record = TelemetryRecord::new(UserId(1))
            .with(TelemetryField::AppTxData, 0.0)
            .with(TelemetryField::AppDelayMax, 10.0);
        let shaped = shaper.shape(&record, DiscreteAction(0)).unwrap();
        assert!(shaped.qos_satisfied);
    }

    #[test]
    fn reward_always_in_bounds() {
        let shaper = shaper(0.3, QosBonus::Delay);
        for delay in [0.0, 10.0, 49.9, 50.0, 500.0] {
            for prr in [0.0, 0.5, 0.99, 1.0] {
                let record = TelemetryRecord::new(UserId(1))
                    .with(TelemetryField::AppTxData, 100.0)
                    .with(TelemetryField::AppRxData, prr * 100.0)
                    .with(TelemetryField::AppDelayMax, delay);
                for action in 0..3 {
                    let shaped = shaper.shape(&record, DiscreteAction(action)).unwrap();
                    assert!((-1.0..=1.0).contains(&shaped.reward.0));
                }
            }
        }
    }

    #[test]
    fn out_of_range_action_is_precondition_error() {
        let shaper = shaper(0.5, QosBonus::Delay);
        let err = shaper
            .shape(&satisfied_record(), DiscreteAction(7))
            .unwrap_err();
        assert!(matches!(err, RlError::Precondition(_)));
    }

    #[test]
    fn snapshot_lengths_must_align() {
        let shaper = shaper(0.5, QosBonus::Delay);
        let snapshot = vec![satisfied_record()];
        assert!(shaper.shape_snapshot(&snapshot, &[]).is_err());
    }
}
