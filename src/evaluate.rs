//! Greedy playback of a trained network.

use log::info;

use crate::env::{Environment, StepStatus};
use crate::error::{PilotError, Result};
use crate::network::ValueFunction;
use crate::reward::{CheckpointTracker, RewardConfig, RewardShaper};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationReport {
    pub rewards: Vec<f32>,
    pub distances: Vec<f32>,
    pub successes: usize,
    pub failures: usize,
}

impl EvaluationReport {
    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    pub fn mean_reward(&self) -> Option<f32> {
        mean(&self.rewards)
    }

    pub fn mean_distance(&self) -> Option<f32> {
        mean(&self.distances)
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

/// Play `episodes` episodes always taking the highest-valued action.
/// Rewards are shaped exactly as during training.
pub fn evaluate<E, V>(
    env: &mut E,
    network: &V,
    episodes: usize,
    reward: RewardConfig,
) -> Result<EvaluationReport>
where
    E: Environment,
    V: ValueFunction,
{
    reward.validate()?;
    if env.num_actions() != network.num_actions() {
        return Err(PilotError::dimension_mismatch(
            format!("{} network outputs", env.num_actions()),
            format!("{}", network.num_actions()),
        ));
    }

    let shaper = RewardShaper::new(reward, env.route());
    let mut tracker = CheckpointTracker::new(reward.num_checkpoints);
    let mut report = EvaluationReport::default();

    for episode in 0..episodes {
        tracker.reset();
        let mut state = env.reset()?;
        let mut cumulative_reward = 0.0;
        let mut furthest = 0.0f32;
        let status = loop {
            let action = network.greedy_action(state.view())?;
            let (status, next_state) = env.step(action)?;
            let progress = env.progress();
            cumulative_reward += shaper.reward(status, progress, &mut tracker);
            furthest = furthest.max(progress);
            state = next_state;
            if status.is_terminal() {
                break status;
            }
        };

        match status {
            StepStatus::Done => report.successes += 1,
            _ => report.failures += 1,
        }
        info!(
            "Episode {}: reward={:.1}; distance={:.1}; {:?}",
            episode + 1,
            cumulative_reward,
            furthest,
            status
        );
        report.rewards.push(cumulative_reward);
        report.distances.push(furthest);
    }
    Ok(report)
}
