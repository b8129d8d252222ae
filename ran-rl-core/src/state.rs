//! State vectors and the learning-state mask

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{Result, RlError};

/// Normalized per-user state for one time step
///
/// Every component lies in [0, 1] once produced by the feature normalizer.
/// Value semantics: the agent holds exactly one current snapshot per user and
/// clones it into the replay memory on store, so callers may reuse their own
/// buffers freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector(pub Array1<f32>);

impl StateVector {
    /// Create a zeroed state of the given dimension
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self(Array1::zeros(dim))
    }

    /// State dimension
    #[must_use]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrow the underlying vector
    #[must_use]
    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }
}

impl From<Vec<f32>> for StateVector {
    fn from(data: Vec<f32>) -> Self {
        Self(Array1::from_vec(data))
    }
}

/// Boolean mask selecting which state dimensions the network learns from
///
/// Trace arrays always record the full state; only the masked projection is
/// fed to the Q-networks and stored in replay transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMask {
    mask: Vec<bool>,
}

impl StateMask {
    /// Mask keeping every dimension
    #[must_use]
    pub fn all(dim: usize) -> Self {
        Self {
            mask: vec![true; dim],
        }
    }

    /// Mask from explicit flags; length must match the state dimension
    pub fn new(mask: Vec<bool>, state_dim: usize) -> Result<Self> {
        if mask.len() != state_dim {
            return Err(RlError::Config(format!(
                "state mask has {} entries for a {}-dimensional state",
                mask.len(),
                state_dim
            )));
        }
        if !mask.iter().any(|&keep| keep) {
            return Err(RlError::Config(
                "state mask must keep at least one dimension".into(),
            ));
        }
        Ok(Self { mask })
    }

    /// Full state dimension the mask applies to
    #[must_use]
    pub fn state_dim(&self) -> usize {
        self.mask.len()
    }

    /// Number of dimensions kept for learning
    #[must_use]
    pub fn learning_dim(&self) -> usize {
        self.mask.iter().filter(|&&keep| keep).count()
    }

    /// Project a full state down to the learning dimensions
    pub fn project(&self, state: &StateVector) -> Result<Array1<f32>> {
        if state.dim() != self.mask.len() {
            return Err(RlError::DimensionMismatch {
                expected: self.mask.len(),
                actual: state.dim(),
            });
        }
        Ok(state
            .0
            .iter()
            .zip(&self.mask)
            .filter(|(_, &keep)| keep)
            .map(|(&v, _)| v)
            .collect())
    }
}
