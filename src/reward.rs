//! Reward shaping for the driving task.
//!
//! The environment only reports whether the car is still running, reached
//! the goal, or crashed. Training on that alone gives a very sparse signal,
//! so non-terminal steps are shaped: the route is cut into equal-length
//! checkpoint zones and the first entry into each zone pays a one-time bonus,
//! while every step pays a small time penalty.

use serde::{Deserialize, Serialize};

use crate::env::{Route, StepStatus};
use crate::error::{PilotError, Result};

/// Records which checkpoint zones already paid their bonus this episode.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointTracker {
    passed: Vec<bool>,
}

impl CheckpointTracker {
    pub fn new(num_checkpoints: usize) -> Self {
        CheckpointTracker {
            passed: vec![false; num_checkpoints],
        }
    }

    pub fn reset(&mut self) {
        self.passed.iter_mut().for_each(|p| *p = false);
    }

    pub fn len(&self) -> usize {
        self.passed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passed.is_empty()
    }

    pub fn is_passed(&self, checkpoint: usize) -> bool {
        self.passed.get(checkpoint).copied().unwrap_or(false)
    }

    /// Mark a checkpoint as paid. Returns false if it already was.
    pub fn mark(&mut self, checkpoint: usize) -> bool {
        match self.passed.get_mut(checkpoint) {
            Some(passed) if !*passed => {
                *passed = true;
                true
            }
            _ => false,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.passed.iter().filter(|&&p| p).count()
    }
}

/// Reward constants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewardConfig {
    pub num_checkpoints: usize,
    /// Upper bound on the return of a successful episode.
    pub max_positive_reward: f32,
    /// Paid on reaching the goal, charged (negated) on a crash.
    pub terminal_success_reward: f32,
    /// Subtracted from every shaped step.
    pub step_penalty: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            num_checkpoints: 3000,
            max_positive_reward: 1000.0,
            terminal_success_reward: 100.0,
            step_penalty: 0.1,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_checkpoints == 0 {
            return Err(PilotError::invalid_parameter(
                "reward.numCheckpoints",
                "must be positive",
            ));
        }
        if self.max_positive_reward < self.terminal_success_reward {
            return Err(PilotError::invalid_parameter(
                "reward.maxPositiveReward",
                "must be at least terminalSuccessReward",
            ));
        }
        Ok(())
    }

    /// Bonus paid for the first entry into a checkpoint zone.
    pub fn checkpoint_bonus(&self) -> f32 {
        (self.max_positive_reward - self.terminal_success_reward) / self.num_checkpoints as f32
    }
}

/// Turns environment status and progress into a training reward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardShaper {
    config: RewardConfig,
    route: Route,
}

impl RewardShaper {
    pub fn new(config: RewardConfig, route: Route) -> Self {
        RewardShaper { config, route }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Reward for one step. Terminal statuses override shaping entirely.
    pub fn reward(&self, status: StepStatus, progress: f32, tracker: &mut CheckpointTracker) -> f32 {
        match status {
            StepStatus::Done => self.config.terminal_success_reward,
            StepStatus::Dead => -self.config.terminal_success_reward,
            StepStatus::Running => self.shaping_reward(progress, tracker),
        }
    }

    /// Checkpoint bonus minus the time penalty for a non-terminal step.
    pub fn shaping_reward(&self, progress: f32, tracker: &mut CheckpointTracker) -> f32 {
        let num_checkpoints = self.config.num_checkpoints;
        let zone_length = self.route.length() / num_checkpoints as f32;
        let current_zone = (progress / zone_length).floor();

        // Past the finish zone: the terminal reward takes over.
        if !current_zone.is_finite() || current_zone >= num_checkpoints as f32 {
            return 0.0;
        }

        let mut reward = 0.0;
        if current_zone >= 1.0 && tracker.mark(current_zone as usize - 1) {
            reward += self.config.checkpoint_bonus();
        }
        reward - self.config.step_penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_marks_once() {
        let mut tracker = CheckpointTracker::new(3);
        assert!(tracker.mark(1));
        assert!(!tracker.mark(1));
        assert!(!tracker.mark(7));
        assert_eq!(tracker.passed_count(), 1);

        tracker.reset();
        assert_eq!(tracker.passed_count(), 0);
        assert!(!tracker.is_passed(1));
    }

    #[test]
    fn test_bonus_formula() {
        let config = RewardConfig {
            num_checkpoints: 10,
            max_positive_reward: 1000.0,
            terminal_success_reward: 100.0,
            step_penalty: 0.1,
        };
        assert_eq!(config.checkpoint_bonus(), 90.0);
    }

    #[test]
    fn test_validate_rejects_inverted_rewards() {
        let config = RewardConfig {
            max_positive_reward: 10.0,
            terminal_success_reward: 100.0,
            ..RewardConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
