//! Example: Double-Q agent learning the toy RAN chain

use ran_rl_agent::{AgentPolicy, FeatureNormalizer, RanAgent, RewardShaper};
use ran_rl_core::AgentConfig;
use ran_rl_env::{EpisodeRunner, RunnerConfig, ToyRanEnv};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let episode_num = 50;
    let step_num = 40;

    // Toy chain environment with one controlled user
    let mut env = ToyRanEnv::new(1, step_num)?;

    // Learning agent over the toy state/action geometry
    let config = AgentConfig {
        step_num,
        episode_num,
        user_num: 1,
        memory_capacity: 100,
        batch_size: 16,
        seed: Some(42),
        ..AgentConfig::default()
    };
    let actions = ToyRanEnv::action_set()?;
    let state_config = ToyRanEnv::state_config()?;
    let mut agent = RanAgent::new(config, state_config.dim(), actions, AgentPolicy::Learned)?;

    // Pipeline components and the driver
    let normalizer = FeatureNormalizer::new(state_config);
    let shaper = RewardShaper::new(ToyRanEnv::reward_config(), agent.actions())?;
    let runner = EpisodeRunner::new(RunnerConfig::new(episode_num), normalizer, shaper)?;

    let reports = runner.run(&mut agent, &mut env).await?;

    for report in reports.iter().step_by(10) {
        println!(
            "Episode {}: steps = {}, temperature = {:.2}, mean reward = {:.3}",
            report.episode, report.steps, report.temperature, report.mean_reward
        );
    }

    let late_rewards: f64 = reports
        .iter()
        .rev()
        .take(10)
        .map(|r| r.mean_reward)
        .sum::<f64>()
        / 10.0;
    println!(
        "\nMean reward over the last 10 episodes: {late_rewards:.3} ({} learning steps)",
        agent.learner().learn_steps()
    );

    Ok(())
}
