//! Replay memory for experience transitions

use ndarray::Array1;
use rand::seq::index::sample as sample_indices;
use rand::Rng;

use ran_rl_core::{DiscreteAction, Result, RlError};

/// One learning transition
///
/// States are owned copies of the agent's masked learning vectors; the buffer
/// never aliases caller-held arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State the action was taken in
    pub state: Array1<f32>,
    /// Action applied
    pub action: DiscreteAction,
    /// Reward produced by the action
    pub reward: f32,
    /// State observed after the action
    pub next_state: Array1<f32>,
}

/// Fixed-capacity ring buffer of transitions with uniform sampling
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    memory: Vec<Transition>,
    capacity: usize,
    inserted: usize,
}

impl ReplayMemory {
    /// Create a replay memory of the given capacity
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::Config("replay capacity must be positive".into()));
        }
        Ok(Self {
            memory: Vec::with_capacity(capacity),
            capacity,
            inserted: 0,
        })
    }

    /// Insert a transition, overwriting the oldest slot once full
    pub fn store(&mut self, transition: Transition) {
        if self.inserted < self.capacity {
            self.memory.push(transition);
        } else {
            let slot = self.inserted % self.capacity;
            self.memory[slot] = transition;
        }
        self.inserted += 1;
    }

    /// Whether the memory has been filled at least once
    #[must_use]
    pub fn ready(&self) -> bool {
        self.inserted >= self.capacity
    }

    /// Number of transitions currently populated
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.min(self.capacity)
    }

    /// Whether the memory holds no transitions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Total number of insertions since construction
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Configured capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transition in a given ring slot, if populated
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Transition> {
        self.memory.get(index)
    }

    /// Draw `batch_size` distinct transitions uniformly, without replacement
    ///
    /// Sampling more than the populated set is a caller bug, not a runtime
    /// condition to retry.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<&Transition>> {
        if batch_size == 0 {
            return Err(RlError::Precondition("empty sample requested".into()));
        }
        if batch_size > self.len() {
            return Err(RlError::Precondition(format!(
                "sample of {} from {} populated transitions",
                batch_size,
                self.len()
            )));
        }
        Ok(sample_indices(rng, self.len(), batch_size)
            .iter()
            .map(|i| &self.memory[i])
            .collect())
    }
}
