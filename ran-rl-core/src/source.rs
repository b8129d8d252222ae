//! Telemetry source boundary
//!
//! A source is the external collaborator the episode driver pulls snapshots
//! from: a live network simulator, or a stored trace replayed offline. The
//! driver blocks on each call; there is no overlap between source I/O and
//! the learning pipeline.

use async_trait::async_trait;

use crate::telemetry::{ActionAssignment, TelemetrySnapshot};

/// A sequential per-step telemetry provider
#[async_trait]
pub trait TelemetrySource: Send {
    /// Prepare the source for a new episode
    async fn reset(&mut self) -> crate::Result<()>;

    /// Pull the next snapshot; `None` once the episode is exhausted
    ///
    /// I/O failures propagate to the driver, which releases the source and
    /// terminates the run; the pipeline never retries a snapshot.
    async fn next_snapshot(&mut self) -> crate::Result<Option<TelemetrySnapshot>>;

    /// Deliver the chosen actions back to the source
    ///
    /// Offline sources ignore the assignments.
    async fn deliver_actions(&mut self, assignments: &[ActionAssignment]) -> crate::Result<()>;

    /// Release any external resources
    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }
}
