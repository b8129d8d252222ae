//! Static configuration objects
//!
//! All lookup tables are resolved to typed accessors once, at construction,
//! and passed by reference into the pipeline components. Unknown names,
//! mismatched lengths and out-of-range parameters fail fast here; nothing is
//! silently defaulted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryField;
use crate::{Result, RlError};

/// Clamp-and-scale range for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormRange {
    /// Raw value mapped to 0
    pub min: f64,
    /// Raw value mapped to 1
    pub max: f64,
}

impl NormRange {
    /// Create a range; `max` must exceed `min`
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(RlError::Config(format!(
                "degenerate normalization range ({min}, {max})"
            )));
        }
        Ok(Self { min, max })
    }

    /// Clamp a raw value into the range, then scale into [0, 1]
    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        (clamped - self.min) / (self.max - self.min)
    }
}

/// One state dimension: a direct field or a ratio of two fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureSpec {
    /// Clamp-and-scale a single telemetry field
    Direct {
        /// Source field
        field: TelemetryField,
        /// Normalization range
        range: NormRange,
    },
    /// Clamp-and-scale `numerator / denominator`
    ///
    /// A denominator `<= 0` means "no data yet" and yields ratio 1 (fully
    /// delivered) by convention, never an error.
    Ratio {
        /// Ratio numerator field
        numerator: TelemetryField,
        /// Ratio denominator field
        denominator: TelemetryField,
        /// Normalization range
        range: NormRange,
    },
}

/// Ordered table of per-field normalization ranges
///
/// The equivalent of the simulator-wide range dictionary: state configs pull
/// their direct-feature ranges from here by field name, once, at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationTable(IndexMap<String, NormRange>);

impl NormalizationTable {
    /// Build a table from `(name, (min, max))` entries
    pub fn new(entries: &[(&str, (f64, f64))]) -> Result<Self> {
        let mut table = IndexMap::with_capacity(entries.len());
        for &(name, (min, max)) in entries {
            // Resolve early so a typo in the table itself fails fast too
            TelemetryField::from_name(name)?;
            table.insert(name.to_string(), NormRange::new(min, max)?);
        }
        Ok(Self(table))
    }

    /// Ranges for the RAN link statistics used by the reference scenarios
    #[must_use]
    pub fn ran_defaults() -> Self {
        Self::new(&[
            ("mcs", (0.0, 28.0)),
            ("symbols", (0.0, 12.0)),
            ("sinr", (0.0, 60.0)),
            ("pdcp_delay_mean", (0.0, 100.0)),
            ("pdcp_delay_stdev", (0.0, 100.0)),
            ("pdcp_delay_min", (0.0, 100.0)),
            ("pdcp_delay_max", (0.0, 100.0)),
            ("app_delay_mean", (0.0, 100.0)),
            ("app_delay_stdev", (0.0, 100.0)),
            ("app_delay_min", (0.0, 100.0)),
            ("app_delay_max", (0.0, 100.0)),
        ])
        .expect("builtin table is well formed")
    }

    /// Look up a range by field name; unknown names are configuration errors
    pub fn range(&self, name: &str) -> Result<NormRange> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| RlError::Config(format!("no normalization range for field: {name}")))
    }
}

/// Full state layout: direct features first, ratio features after
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    features: Vec<FeatureSpec>,
}

impl StateConfig {
    /// Create a state config from resolved specs
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        if features.is_empty() {
            return Err(RlError::Config("state config has no features".into()));
        }
        Ok(Self { features })
    }

    /// Resolve a state layout from field names and a normalization table
    ///
    /// `direct` entries pull their range from the table; `ratios` are
    /// `(numerator, denominator)` pairs scaled over [0, 1].
    pub fn from_names(
        direct: &[&str],
        ratios: &[(&str, &str)],
        table: &NormalizationTable,
    ) -> Result<Self> {
        let mut features = Vec::with_capacity(direct.len() + ratios.len());
        for name in direct {
            features.push(FeatureSpec::Direct {
                field: TelemetryField::from_name(name)?,
                range: table.range(name)?,
            });
        }
        for (num, den) in ratios {
            features.push(FeatureSpec::Ratio {
                numerator: TelemetryField::from_name(num)?,
                denominator: TelemetryField::from_name(den)?,
                range: NormRange::new(0.0, 1.0)?,
            });
        }
        Self::new(features)
    }

    /// State dimension
    #[must_use]
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// The resolved feature specs, in state order
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }
}

/// Which KPI margin sweetens the reward when QoS is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QosBonus {
    /// Penalize proportionally to consumed delay budget
    Delay,
    /// Penalize proportionally to delivery-ratio slack
    Prr,
}

impl std::str::FromStr for QosBonus {
    type Err = RlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "delay" => Ok(QosBonus::Delay),
            "prr" => Ok(QosBonus::Prr),
            other => Err(RlError::Config(format!("unknown QoS bonus mode: {other}"))),
        }
    }
}

/// Reward-shaping configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Delivery-ratio numerator field
    pub prr_numerator: TelemetryField,
    /// Delivery-ratio denominator field
    pub prr_denominator: TelemetryField,
    /// Field carrying the per-step application delay
    pub delay_field: TelemetryField,
    /// SLA delay bound (same unit as `delay_field`)
    pub delay_requirement: f64,
    /// SLA delivery-ratio bound
    pub prr_requirement: f64,
    /// Weight of action cost against QoS-violation cost, in [0, 1]
    pub alpha: f64,
    /// Bonus mode applied when QoS is satisfied
    pub qos_bonus: QosBonus,
}

impl RewardConfig {
    /// Validate requirements and the cost weight
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(RlError::Config(format!(
                "reward alpha {} outside [0, 1]",
                self.alpha
            )));
        }
        if !(self.delay_requirement > 0.0) {
            return Err(RlError::Config(format!(
                "delay requirement {} must be positive",
                self.delay_requirement
            )));
        }
        if !(self.prr_requirement > 0.0 && self.prr_requirement <= 1.0) {
            return Err(RlError::Config(format!(
                "PRR requirement {} outside (0, 1]",
                self.prr_requirement
            )));
        }
        Ok(())
    }
}

/// Learning hyperparameters and run geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Time steps per episode
    pub step_num: usize,
    /// Number of episodes
    pub episode_num: usize,
    /// Users controlled by the shared learner
    pub user_num: usize,
    /// Discount factor
    pub gamma: f64,
    /// Mini-batch size for the learning step
    pub batch_size: usize,
    /// Replay memory capacity
    pub memory_capacity: usize,
    /// Learning steps between hard target-network syncs
    pub target_replace: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam epsilon
    pub eps: f64,
    /// Adam L2 weight decay
    pub weight_decay: f64,
    /// Seed for the injected random source; entropy when unset
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_num: 100,
            episode_num: 1000,
            user_num: 1,
            gamma: 0.95,
            batch_size: 16,
            memory_capacity: 200,
            target_replace: 200,
            learning_rate: 1e-4,
            eps: 1e-4,
            weight_decay: 1e-4,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Validate run geometry and hyperparameters
    pub fn validate(&self) -> Result<()> {
        if self.step_num == 0 || self.episode_num == 0 || self.user_num == 0 {
            return Err(RlError::Config(
                "step_num, episode_num and user_num must be positive".into(),
            ));
        }
        if self.batch_size == 0 || self.memory_capacity == 0 {
            return Err(RlError::Config(
                "batch_size and memory_capacity must be positive".into(),
            ));
        }
        if self.batch_size > self.memory_capacity {
            return Err(RlError::Config(format!(
                "batch size {} exceeds memory capacity {}",
                self.batch_size, self.memory_capacity
            )));
        }
        if self.target_replace == 0 {
            return Err(RlError::Config("target_replace must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RlError::Config(format!(
                "gamma {} outside [0, 1]",
                self.gamma
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.eps > 0.0) || self.weight_decay < 0.0 {
            return Err(RlError::Config(
                "optimizer hyperparameters out of range".into(),
            ));
        }
        Ok(())
    }

    /// Total trace capacity of the run
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.step_num * self.episode_num
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn range_scales_and_clamps() {
        let range = NormRange::new(0.0, 28.0).unwrap();
        assert_relative_eq!(range.scale(14.0), 0.5);
        assert_relative_eq!(range.scale(-5.0), 0.0);
        assert_relative_eq!(range.scale(100.0), 1.0);
    }

    proptest::proptest! {
        #[test]
        fn scale_stays_in_unit_interval(
            min in -1e6..1e6f64,
            width in 1e-3..1e6f64,
            value in -1e9..1e9f64,
        ) {
            let range = NormRange::new(min, min + width).unwrap();
            let scaled = range.scale(value);
            proptest::prop_assert!((0.0..=1.0).contains(&scaled));
            proptest::prop_assert_eq!(range.scale(min - 1.0), 0.0);
            proptest::prop_assert_eq!(range.scale(min + width + 1.0), 1.0);
        }
    }

    #[test]
    fn degenerate_ranges_rejected() {
        assert!(NormRange::new(1.0, 1.0).is_err());
        assert!(NormRange::new(2.0, 1.0).is_err());
        assert!(NormRange::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn state_config_resolves_names_once() {
        let table = NormalizationTable::ran_defaults();
        let config = StateConfig::from_names(
            &["mcs", "sinr", "pdcp_delay_mean"],
            &[("pdcp_rx_data", "pdcp_tx_data")],
            &table,
        )
        .unwrap();
        assert_eq!(config.dim(), 4);
        match config.features()[3] {
            FeatureSpec::Ratio { numerator, .. } => {
                assert_eq!(numerator, TelemetryField::PdcpRxData);
            }
            FeatureSpec::Direct { .. } => panic!("expected ratio feature"),
        }
    }

    #[test]
    fn unknown_names_fail_fast() {
        let table = NormalizationTable::ran_defaults();
        assert!(StateConfig::from_names(&["mcs", "bogus"], &[], &table).is_err());
        assert!(StateConfig::from_names(&["rlc_tx_pkt"], &[], &table).is_err());
    }

    #[test]
    fn qos_bonus_parsing() {
        assert_eq!("delay".parse::<QosBonus>().unwrap(), QosBonus::Delay);
        assert_eq!("prr".parse::<QosBonus>().unwrap(), QosBonus::Prr);
        assert!("latency".parse::<QosBonus>().is_err());
    }

    #[test]
    fn agent_config_validation() {
        let mut config = AgentConfig::default();
        config.validate().unwrap();
        config.batch_size = config.memory_capacity + 1;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.gamma = 1.5;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.target_replace = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reward_config_validation() {
        let mut config = RewardConfig {
            prr_numerator: TelemetryField::AppRxData,
            prr_denominator: TelemetryField::AppTxData,
            delay_field: TelemetryField::AppDelayMax,
            delay_requirement: 50.0,
            prr_requirement: 0.99,
            alpha: 0.5,
            qos_bonus: QosBonus::Delay,
        };
        config.validate().unwrap();
        config.alpha = 1.2;
        assert!(config.validate().is_err());
        config.alpha = 0.5;
        config.prr_requirement = 0.0;
        assert!(config.validate().is_err());
    }
}
