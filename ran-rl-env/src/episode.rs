//! Episode driver: telemetry in, actions out, one step at a time
//!
//! Runs the Feature Normalizer -> Reward Shaper -> Agent pipeline over any
//! [`TelemetrySource`], one blocking snapshot at a time. Rewards are always
//! shaped with the actions applied in the previous step, the ones that
//! produced the telemetry being scored.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ran_rl_agent::{AgentPolicy, FeatureNormalizer, RanAgent, RewardShaper};
use ran_rl_core::{
    ActionAssignment, DiscreteAction, Result, RlError, Schedule, TelemetrySource,
    TemperatureSchedule,
};

/// Episode driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of episodes to run
    pub episode_num: usize,
    /// Optional per-episode step cap (the source may end episodes earlier)
    pub max_steps: Option<usize>,
    /// Whether the agent stores transitions and learns
    pub train: bool,
    /// Last-stretch shaping exponent for the temperature schedule
    pub temperature_exponent: f64,
    /// Where to checkpoint agent state; no persistence when unset
    pub checkpoint_dir: Option<PathBuf>,
    /// Episodes between checkpoints; defaults to a tenth of the run
    pub checkpoint_interval: Option<usize>,
}

impl RunnerConfig {
    /// Create a training configuration for a run of `episode_num` episodes
    #[must_use]
    pub fn new(episode_num: usize) -> Self {
        Self {
            episode_num,
            max_steps: None,
            train: true,
            temperature_exponent: 1.0,
            checkpoint_dir: None,
            checkpoint_interval: None,
        }
    }

    fn effective_checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
            .unwrap_or(self.episode_num / 10)
            .max(1)
    }
}

/// Summary of one driven episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    /// Episode identifier
    pub id: String,
    /// Episode index within the run
    pub episode: usize,
    /// Exploration temperature used
    pub temperature: f64,
    /// Steps actually driven
    pub steps: usize,
    /// Mean shaped reward over users and steps
    pub mean_reward: f64,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
}

/// Drives episodes of the normalize -> shape -> act -> learn pipeline
pub struct EpisodeRunner {
    config: RunnerConfig,
    schedule: TemperatureSchedule,
    normalizer: FeatureNormalizer,
    shaper: RewardShaper,
}

impl EpisodeRunner {
    /// Create a runner; the temperature schedule is precomputed here
    pub fn new(
        config: RunnerConfig,
        normalizer: FeatureNormalizer,
        shaper: RewardShaper,
    ) -> Result<Self> {
        let schedule =
            TemperatureSchedule::shaped(config.episode_num, config.temperature_exponent)?;
        Ok(Self {
            config,
            schedule,
            normalizer,
            shaper,
        })
    }

    /// Run every configured episode, releasing the source on failure
    pub async fn run<S: TelemetrySource>(
        &self,
        agent: &mut RanAgent,
        source: &mut S,
    ) -> Result<Vec<EpisodeReport>> {
        let result = self.run_inner(agent, source).await;
        match result {
            Ok(reports) => {
                source.close().await?;
                Ok(reports)
            }
            Err(err) => {
                // Release the external collaborator before terminating
                if let Err(close_err) = source.close().await {
                    warn!(error = %close_err, "failed to close telemetry source");
                }
                Err(err)
            }
        }
    }

    async fn run_inner<S: TelemetrySource>(
        &self,
        agent: &mut RanAgent,
        source: &mut S,
    ) -> Result<Vec<EpisodeReport>> {
        let mut reports = Vec::with_capacity(self.config.episode_num);
        let interval = self.config.effective_checkpoint_interval();

        for episode in 0..self.config.episode_num {
            // Periodic checkpoint, before the episode like the saved data
            // suggests: the artifacts cover episodes [0, episode)
            if let Some(dir) = &self.config.checkpoint_dir {
                if episode > 0 && episode % interval == 0 {
                    agent.save(dir).await?;
                }
            }

            let report = self.run_episode(episode, agent, source).await?;
            info!(
                episode,
                steps = report.steps,
                temperature = report.temperature,
                mean_reward = report.mean_reward,
                "episode finished"
            );
            reports.push(report);
        }

        if let Some(dir) = &self.config.checkpoint_dir {
            agent.save(dir).await?;
        }
        Ok(reports)
    }

    async fn run_episode<S: TelemetrySource>(
        &self,
        episode: usize,
        agent: &mut RanAgent,
        source: &mut S,
    ) -> Result<EpisodeReport> {
        let started_at = Utc::now();
        let temperature = if self.config.train {
            self.schedule.value(episode)
        } else {
            0.0
        };

        agent.reset();
        source.reset().await?;

        // Bootstrap actions for the first reward: the fixed baseline uses its
        // own action, everything else starts from a random draw
        let mut last_actions: Vec<DiscreteAction> = match agent.policy() {
            AgentPolicy::Fixed(index) => vec![DiscreteAction(index); agent.user_num()],
            _ => agent.random_actions(),
        };

        let mut steps = 0usize;
        let mut reward_sum = 0.0f64;

        while let Some(snapshot) = source.next_snapshot().await? {
            if snapshot.len() != agent.user_num() {
                return Err(RlError::DimensionMismatch {
                    expected: agent.user_num(),
                    actual: snapshot.len(),
                });
            }

            let states = self.normalizer.normalize_snapshot(&snapshot);
            let shaped = self.shaper.shape_snapshot(&snapshot, &last_actions)?;
            let chosen = agent.select_actions(&states, temperature)?;
            agent.update(&chosen, &shaped, &states, temperature, self.config.train)?;

            let assignments: Vec<ActionAssignment> = snapshot
                .iter()
                .zip(&chosen)
                .map(|(record, choice)| {
                    ActionAssignment::new(record.imsi, agent.actions().label(choice.action))
                })
                .collect::<Result<_>>()?;
            source.deliver_actions(&assignments).await?;

            last_actions = chosen.iter().map(|c| c.action).collect();
            reward_sum += shaped.iter().map(|s| s.reward.0).sum::<f64>()
                / shaped.len() as f64;
            steps += 1;

            if self.config.max_steps.is_some_and(|cap| steps >= cap) {
                break;
            }
        }

        Ok(EpisodeReport {
            id: uuid::Uuid::new_v4().to_string(),
            episode,
            temperature,
            steps,
            mean_reward: if steps == 0 {
                0.0
            } else {
                reward_sum / steps as f64
            },
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ran_rl_core::{ActionSet, AgentConfig, StateConfig};

    use crate::toy::ToyRanEnv;
    use crate::trace_source::TraceSource;

    fn toy_runner(
        episode_num: usize,
        train: bool,
        checkpoint_dir: Option<PathBuf>,
    ) -> EpisodeRunner {
        let state_config: StateConfig = ToyRanEnv::state_config().unwrap();
        let normalizer = FeatureNormalizer::new(state_config);
        let shaper =
            RewardShaper::new(ToyRanEnv::reward_config(), &ToyRanEnv::action_set().unwrap())
                .unwrap();
        let config = RunnerConfig {
            train,
            checkpoint_dir,
            ..RunnerConfig::new(episode_num)
        };
        EpisodeRunner::new(config, normalizer, shaper).unwrap()
    }

    fn toy_agent(capacity: usize, step_num: usize, episode_num: usize) -> RanAgent {
        let config = AgentConfig {
            step_num,
            episode_num,
            user_num: 1,
            memory_capacity: capacity,
            batch_size: 4,
            seed: Some(5),
            ..AgentConfig::default()
        };
        let actions: ActionSet = ToyRanEnv::action_set().unwrap();
        RanAgent::new(
            config,
            ToyRanEnv::state_config().unwrap().dim(),
            actions,
            AgentPolicy::Learned,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn toy_run_fills_the_memory_and_learns_once() {
        let capacity = 8;
        let steps = capacity + 1;
        let mut agent = toy_agent(capacity, steps, 1);
        let mut env = ToyRanEnv::new(1, steps).unwrap();
        // One-episode schedule: the single episode runs at temperature 0,
        // pure greedy after the randomized first action
        let runner = toy_runner(1, true, None);

        let reports = runner.run(&mut agent, &mut env).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].steps, steps);
        assert_eq!(reports[0].temperature, 0.0);

        // capacity+1 steps with one user: the first stores nothing, the rest
        // fill the replay memory exactly, and the final step learns once
        assert_eq!(agent.learner().memory().len(), capacity);
        assert_eq!(agent.learner().memory().inserted(), capacity);
        assert_eq!(agent.learner().learn_steps(), 1);
        let loss = agent.trace().losses()[steps - 1];
        assert!(loss.is_finite());
    }

    #[tokio::test]
    async fn shaped_rewards_follow_the_position_table() {
        // Untrained fixed-action run: the agent stays mid-chain, so every
        // step after the first meets the SLA with a zero-penalty action
        let steps = 5;
        let config = AgentConfig {
            step_num: steps,
            episode_num: 1,
            user_num: 1,
            memory_capacity: 8,
            batch_size: 4,
            seed: Some(7),
            ..AgentConfig::default()
        };
        let mut agent = RanAgent::new(
            config,
            ToyRanEnv::state_config().unwrap().dim(),
            ToyRanEnv::action_set().unwrap(),
            AgentPolicy::Fixed(0),
        )
        .unwrap();
        let mut env = ToyRanEnv::new(1, steps).unwrap();
        let runner = toy_runner(1, false, None);

        let reports = runner.run(&mut agent, &mut env).await.unwrap();
        assert_eq!(reports[0].steps, steps);
        // Stay at position 1 with action penalty 0: shaped reward +1 each step
        assert!((reports[0].mean_reward - 1.0).abs() < 1e-9);
        let rewards = agent.trace().rewards();
        for step in 0..steps {
            assert!((rewards[[0, step]] - 1.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn multi_episode_run_keeps_trace_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let episodes = 3;
        let steps = 4;
        let mut agent = toy_agent(64, steps, episodes);
        let mut env = ToyRanEnv::new(1, steps).unwrap();
        let runner = toy_runner(episodes, true, Some(dir.path().to_path_buf()));

        let reports = runner.run(&mut agent, &mut env).await.unwrap();
        assert_eq!(reports.len(), episodes);
        assert_eq!(agent.trace().data_idx(), episodes * steps);

        // Temperatures are non-increasing across episodes
        for pair in reports.windows(2) {
            assert!(pair[0].temperature >= pair[1].temperature);
        }

        // The final checkpoint restores into a fresh agent
        let mut restored = toy_agent(64, steps, episodes);
        restored.load(dir.path()).await.unwrap();
        assert_eq!(restored.trace().data_idx(), episodes * steps);
    }

    #[tokio::test]
    async fn offline_replay_drives_the_same_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.jsonl");

        // Record a toy episode to a trace file, then replay it offline
        let mut env = ToyRanEnv::new(1, 6).unwrap();
        let mut lines = String::new();
        while let Some(snapshot) = env.next_snapshot().await.unwrap() {
            lines.push_str(&serde_json::to_string(&snapshot).unwrap());
            lines.push('\n');
        }
        tokio::fs::write(&path, lines).await.unwrap();

        let mut agent = toy_agent(64, 6, 1);
        let mut source = TraceSource::open(&path, 1).await.unwrap();
        let runner = toy_runner(1, true, None);
        let reports = runner.run(&mut agent, &mut source).await.unwrap();
        assert_eq!(reports[0].steps, 6);
        assert_eq!(agent.trace().data_idx(), 6);
    }

    #[tokio::test]
    async fn snapshot_user_mismatch_fails_the_run() {
        let mut agent = toy_agent(8, 4, 1);
        // Two-user environment against a one-user agent
        let mut env = ToyRanEnv::new(2, 4).unwrap();
        let runner = toy_runner(1, true, None);
        assert!(runner.run(&mut agent, &mut env).await.is_err());
    }

    #[tokio::test]
    async fn max_steps_caps_an_episode() {
        let mut agent = toy_agent(64, 10, 1);
        let mut env = ToyRanEnv::new(1, 10).unwrap();
        let state_config: StateConfig = ToyRanEnv::state_config().unwrap();
        let normalizer = FeatureNormalizer::new(state_config);
        let shaper =
            RewardShaper::new(ToyRanEnv::reward_config(), &ToyRanEnv::action_set().unwrap())
                .unwrap();
        let config = RunnerConfig {
            max_steps: Some(3),
            ..RunnerConfig::new(1)
        };
        let runner = EpisodeRunner::new(config, normalizer, shaper).unwrap();
        let reports = runner.run(&mut agent, &mut env).await.unwrap();
        assert_eq!(reports[0].steps, 3);
    }
}
