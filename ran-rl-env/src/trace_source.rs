//! Offline telemetry replay from stored trace files

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use ran_rl_core::{
    ActionAssignment, Result, RlError, TelemetrySnapshot, TelemetrySource,
};

/// Replays per-step telemetry snapshots from a JSONL trace file
///
/// Each line holds one step: the JSON array of every user's record. Actions
/// are accepted and ignored, so the agent's collection path is identical to
/// a live run.
#[derive(Debug)]
pub struct TraceSource {
    path: PathBuf,
    snapshots: Vec<TelemetrySnapshot>,
    cursor: usize,
}

impl TraceSource {
    /// Load a trace file, validating the per-step user count
    ///
    /// Missing or corrupt files propagate as errors; the pipeline never
    /// silently skips a malformed step.
    pub async fn open(path: &Path, user_num: usize) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read trace file {}", path.display()))?;

        let mut snapshots = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let snapshot: TelemetrySnapshot = serde_json::from_str(line)
                .with_context(|| format!("corrupt trace entry at line {}", line_no + 1))?;
            if snapshot.len() != user_num {
                return Err(RlError::Telemetry(format!(
                    "trace line {} has {} users, expected {user_num}",
                    line_no + 1,
                    snapshot.len()
                )));
            }
            snapshots.push(snapshot);
        }

        if snapshots.is_empty() {
            return Err(RlError::Telemetry(format!(
                "trace file {} holds no snapshots",
                path.display()
            )));
        }
        info!(path = %path.display(), steps = snapshots.len(), "offline trace loaded");

        Ok(Self {
            path: path.to_path_buf(),
            snapshots,
            cursor: 0,
        })
    }

    /// Path the trace was loaded from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of steps in the trace
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the trace is empty (never true for an opened trace)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl TelemetrySource for TraceSource {
    async fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    async fn next_snapshot(&mut self) -> Result<Option<TelemetrySnapshot>> {
        if self.cursor >= self.snapshots.len() {
            return Ok(None);
        }
        let snapshot = self.snapshots[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(snapshot))
    }

    async fn deliver_actions(&mut self, _assignments: &[ActionAssignment]) -> Result<()> {
        // Replay is open loop: the recorded telemetry already happened
        Ok(())
    }
}
