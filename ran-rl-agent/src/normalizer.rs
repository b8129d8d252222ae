//! Feature normalization: raw telemetry to [0, 1] state vectors

use ran_rl_core::{FeatureSpec, StateConfig, StateVector, TelemetryRecord};

/// Maps one user's telemetry record to a normalized state vector
///
/// Field names were resolved to typed accessors when the [`StateConfig`] was
/// built, so normalization is straight indexed reads; a pure function of the
/// record and the static configuration.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    config: StateConfig,
}

impl FeatureNormalizer {
    /// Create a normalizer over a resolved state layout
    #[must_use]
    pub fn new(config: StateConfig) -> Self {
        Self { config }
    }

    /// State dimension produced per user
    #[must_use]
    pub fn dim(&self) -> usize {
        self.config.dim()
    }

    /// Normalize one user's record into `[0, 1]^D`
    #[must_use]
    pub fn normalize(&self, record: &TelemetryRecord) -> StateVector {
        let features = self
            .config
            .features()
            .iter()
            .map(|spec| match *spec {
                FeatureSpec::Direct { field, range } => range.scale(record.get(field)) as f32,
                FeatureSpec::Ratio {
                    numerator,
                    denominator,
                    range,
                } => {
                    let den = record.get(denominator);
                    // No traffic yet counts as fully delivered
                    let ratio = if den <= 0.0 {
                        1.0
                    } else {
                        record.get(numerator) / den
                    };
                    range.scale(ratio) as f32
                }
            })
            .collect();
        StateVector(features)
    }

    /// Normalize every user's record in a snapshot, independently
    #[must_use]
    pub fn normalize_snapshot(&self, snapshot: &[TelemetryRecord]) -> Vec<StateVector> {
        snapshot.iter().map(|r| self.normalize(r)).collect()
    }
}
