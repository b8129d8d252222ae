//! Exploration schedules

use serde::{Deserialize, Serialize};

use crate::{Result, RlError};

/// Trait for schedules (e.g., for temperature decay)
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: usize) -> f64;
}

/// Linear schedule that decays from start to end over steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSchedule {
    /// Starting value
    pub start: f64,
    /// Ending value
    pub end: f64,
    /// Number of steps for decay
    pub steps: usize,
}

impl LinearSchedule {
    /// Create a new linear schedule
    #[must_use]
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self { start, end, steps }
    }
}

impl Schedule for LinearSchedule {
    fn value(&self, t: usize) -> f64 {
        if t >= self.steps {
            self.end
        } else {
            let progress = t as f64 / self.steps as f64;
            self.start + (self.end - self.start) * progress
        }
    }
}

/// Exponential decay schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl ExponentialSchedule {
    /// Create a new exponential schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            start,
            min_value,
            decay_rate,
        }
    }
}

impl Schedule for ExponentialSchedule {
    fn value(&self, t: usize) -> f64 {
        let value = self.start * self.decay_rate.powf(t as f64);
        value.max(self.min_value)
    }
}

/// Precomputed per-episode exploration temperature table
///
/// Temperatures decay linearly from just under 1 to 0 across the run, with an
/// optional exponent that sharpens the last stretch. The table is monotone
/// non-increasing by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSchedule {
    temps: Vec<f64>,
}

impl TemperatureSchedule {
    /// Linear decay over `episode_num` episodes: `(N - 1 - e) / N`
    pub fn linear(episode_num: usize) -> Result<Self> {
        Self::shaped(episode_num, 1.0)
    }

    /// Linear decay raised to `exponent`; `exponent > 1` spends more of the
    /// run at low temperature
    pub fn shaped(episode_num: usize, exponent: f64) -> Result<Self> {
        if episode_num == 0 {
            return Err(RlError::Config("temperature schedule needs episodes".into()));
        }
        if !(exponent > 0.0) {
            return Err(RlError::Config(format!(
                "temperature exponent {exponent} must be positive"
            )));
        }
        let n = episode_num as f64;
        let temps = (0..episode_num)
            .map(|e| ((n - 1.0 - e as f64) / n).powf(exponent))
            .collect();
        Ok(Self { temps })
    }

    /// Number of scheduled episodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.temps.len()
    }

    /// Whether the schedule is empty (never true for a constructed schedule)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }
}

impl Schedule for TemperatureSchedule {
    fn value(&self, t: usize) -> f64 {
        // Past the end of the run, stay at the final (lowest) temperature
        let idx = t.min(self.temps.len() - 1);
        self.temps[idx]
    }
}
