//! Discrete actions and the configured action set

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Result, RlError};

/// Discrete action index in `[0, action_num)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteAction(pub usize);

/// The configured discrete action set
///
/// Each action pairs an external wire label (the encoding/model identifier
/// the simulator understands) with the distortion penalty incurred by
/// choosing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSet {
    labels: Vec<i16>,
    penalties: Vec<f64>,
}

impl ActionSet {
    /// Create an action set; labels and penalties must align
    pub fn new(labels: Vec<i16>, penalties: Vec<f64>) -> Result<Self> {
        if labels.is_empty() {
            return Err(RlError::Config("action set must not be empty".into()));
        }
        if labels.len() != penalties.len() {
            return Err(RlError::Config(format!(
                "{} action labels but {} penalties",
                labels.len(),
                penalties.len()
            )));
        }
        if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(RlError::Config(
                "action penalties must be finite and non-negative".into(),
            ));
        }
        if penalties.iter().all(|&p| p <= 0.0) {
            return Err(RlError::Config(
                "at least one action penalty must be positive".into(),
            ));
        }
        Ok(Self { labels, penalties })
    }

    /// Number of actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty (never true for a constructed set)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether an action index is valid for this set
    #[must_use]
    pub fn contains(&self, action: DiscreteAction) -> bool {
        action.0 < self.labels.len()
    }

    /// External wire label of an action
    #[must_use]
    pub fn label(&self, action: DiscreteAction) -> i16 {
        self.labels[action.0]
    }

    /// Distortion penalty of an action
    #[must_use]
    pub fn penalty(&self, action: DiscreteAction) -> f64 {
        self.penalties[action.0]
    }

    /// Largest penalty in the table
    #[must_use]
    pub fn max_penalty(&self) -> f64 {
        self.penalties.iter().copied().fold(0.0, f64::max)
    }

    /// Sample an action uniformly at random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DiscreteAction {
        DiscreteAction(rng.gen_range(0..self.labels.len()))
    }

    /// One-hot encoding of an action, for learning traces
    #[must_use]
    pub fn one_hot(&self, action: DiscreteAction) -> Array1<f32> {
        let mut encoded = Array1::zeros(self.labels.len());
        encoded[action.0] = 1.0;
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn point_cloud_actions() -> ActionSet {
        // Compression levels with the measured chamfer-distance penalties
        ActionSet::new(vec![1450, 1451, 1452], vec![0.000044, 5.476881, 35.634660]).unwrap()
    }

    #[test]
    fn lengths_must_align() {
        assert!(ActionSet::new(vec![0, 1], vec![1.0]).is_err());
        assert!(ActionSet::new(vec![], vec![]).is_err());
        assert!(ActionSet::new(vec![0], vec![f64::NAN]).is_err());
        assert!(ActionSet::new(vec![0, 1], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn lookups() {
        let actions = point_cloud_actions();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions.label(DiscreteAction(2)), 1452);
        assert!(actions.contains(DiscreteAction(2)));
        assert!(!actions.contains(DiscreteAction(3)));
        assert!((actions.max_penalty() - 35.634_660).abs() < 1e-12);
    }

    #[test]
    fn one_hot_encoding() {
        let actions = point_cloud_actions();
        let encoded = actions.one_hot(DiscreteAction(1));
        assert_eq!(encoded.to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn sampling_stays_in_range() {
        let actions = point_cloud_actions();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(actions.contains(actions.sample(&mut rng)));
        }
    }
}
