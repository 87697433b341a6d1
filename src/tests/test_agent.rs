use ndarray::{array, Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::agent::Agent;
use crate::env::corridor::{ACTION_BACK, ACTION_FORWARD};
use crate::env::{Corridor, Environment};
use crate::error::{PilotError, Result};
use crate::exploration::ExplorationSchedule;
use crate::network::ValueFunction;
use crate::reward::RewardConfig;

/// Value function that returns the same action values for every state and
/// records what it was trained on.
#[derive(Clone, Debug)]
struct FixedValues {
    values: Array1<f32>,
    last_actions: Vec<usize>,
    last_targets: Option<Array1<f32>>,
    optimize_calls: usize,
}

impl FixedValues {
    fn new(values: Array1<f32>) -> Self {
        FixedValues {
            values,
            last_actions: Vec::new(),
            last_targets: None,
            optimize_calls: 0,
        }
    }
}

impl ValueFunction for FixedValues {
    fn input_size(&self) -> usize {
        2
    }

    fn num_actions(&self) -> usize {
        self.values.len()
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        Ok(Array2::from_shape_fn((states.nrows(), self.values.len()), |(_, j)| {
            self.values[j]
        }))
    }

    fn optimize_step(
        &mut self,
        _states: ArrayView2<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
    ) -> Result<f32> {
        self.last_actions = actions.to_vec();
        self.last_targets = Some(targets.to_owned());
        self.optimize_calls += 1;
        Ok(0.0)
    }

    fn clone_weights_into(&self, other: &mut Self) -> Result<()> {
        other.values = self.values.clone();
        Ok(())
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load(_path: &Path) -> Result<Self> {
        Err(PilotError::IoError("not persisted".to_string()))
    }
}

fn reward_config() -> RewardConfig {
    RewardConfig {
        num_checkpoints: 3,
        max_positive_reward: 100.0,
        terminal_success_reward: 10.0,
        step_penalty: 0.1,
    }
}

fn greedy_agent(length: usize, online: Array1<f32>) -> Agent<Corridor, FixedValues> {
    Agent::new(
        Corridor::new(length, 50),
        FixedValues::new(online),
        FixedValues::new(array![0.0, 0.0, 0.0]),
        ExplorationSchedule::new(0.0, 0.0, 1),
        reward_config(),
        100,
        StdRng::seed_from_u64(0),
    )
    .unwrap()
}

#[test]
fn test_target_starts_as_copy_of_online() {
    let agent = greedy_agent(3, array![1.0, 2.0, 3.0]);
    assert_eq!(agent.target().values, array![1.0, 2.0, 3.0]);
}

#[test]
fn test_greedy_action_uses_online_network() {
    let mut agent = greedy_agent(10, array![5.0, 0.0, 0.0]);
    agent.online_mut().values = array![0.0, 0.0, 5.0];

    let outcome = agent.play_step().unwrap();
    assert_eq!(outcome.action, ACTION_BACK);
    assert_eq!(agent.target().values, array![5.0, 0.0, 0.0]);
}

#[test]
fn test_outcome_is_captured_before_reset() {
    let mut agent = greedy_agent(10, array![0.0, 0.0, 5.0]);

    let outcome = agent.play_step().unwrap();
    assert!(outcome.dead);
    assert!(!outcome.done);
    assert!(outcome.episode_ended());
    assert_eq!(outcome.cumulative_reward, -10.0);
    assert_eq!(outcome.episode_frames, 1);

    // The agent has already moved on to a fresh episode.
    assert_eq!(agent.episode().stats().cumulative_reward, 0.0);
    assert_eq!(agent.episode().stats().start_frame, 1);
    assert_eq!(agent.current_state(), &array![0.0, 1.0]);

    let stored = agent.replay_buffer().iter().last().unwrap();
    assert!(stored.terminal);
    assert_eq!(stored.reward, -10.0);
    assert_eq!(stored.state, array![0.0, 1.0]);
    assert_eq!(stored.next_state, array![-0.1, 1.1]);
}

#[test]
fn test_episode_scope_resets_checkpoints() {
    let mut agent = greedy_agent(3, array![5.0, 0.0, 0.0]);

    let first = agent.play_step().unwrap();
    assert!((first.reward - 29.9).abs() < 1e-4);
    assert_eq!(agent.episode().tracker().passed_count(), 1);

    agent.play_step().unwrap();
    let last = agent.play_step().unwrap();
    assert!(last.done);
    assert_eq!(last.reward, 10.0);
    assert!((last.cumulative_reward - (29.9 + 29.9 + 10.0)).abs() < 1e-3);
    assert_eq!(last.furthest_distance, 3.0);

    assert_eq!(agent.episode().tracker().passed_count(), 0);
    let replayed = agent.play_step().unwrap();
    assert!((replayed.reward - 29.9).abs() < 1e-4);
    assert_eq!(agent.frame_count(), 4);
    assert_eq!(agent.replay_buffer().len(), 4);
}

#[test]
fn test_epsilon_follows_frame_count() {
    let mut agent = Agent::new(
        Corridor::new(100, 1000),
        FixedValues::new(array![1.0, 0.0, 0.0]),
        FixedValues::new(array![0.0, 0.0, 0.0]),
        ExplorationSchedule::new(1.0, 0.0, 10),
        reward_config(),
        100,
        StdRng::seed_from_u64(3),
    )
    .unwrap();
    let schedule = *agent.schedule();

    for frame in 0..15u64 {
        let outcome = agent.play_step().unwrap();
        assert_eq!(outcome.epsilon, schedule.epsilon(frame));
        assert_eq!(agent.epsilon(), schedule.epsilon(frame));
        assert_eq!(agent.frame_count(), frame + 1);
    }
}

#[test]
fn test_full_exploration_covers_all_actions() {
    let mut agent = Agent::new(
        Corridor::new(1000, 10_000),
        FixedValues::new(array![1.0, 0.0, 0.0]),
        FixedValues::new(array![0.0, 0.0, 0.0]),
        ExplorationSchedule::new(1.0, 1.0, 1),
        reward_config(),
        1000,
        StdRng::seed_from_u64(4),
    )
    .unwrap();

    let mut seen = [false; 3];
    for _ in 0..200 {
        seen[agent.play_step().unwrap().action] = true;
    }
    assert_eq!(seen, [true, true, true]);
}

#[test]
fn test_targets_bootstrap_from_target_network() {
    let mut agent = greedy_agent(3, array![5.0, 0.0, 0.0]);
    for _ in 0..3 {
        agent.play_step().unwrap();
    }
    // Targets come from the target copy, not from the online values.
    agent.online_mut().values = array![100.0, 0.0, 0.0];

    agent.train_on_replay_batch(3, 0.5).unwrap();

    let online = agent.online();
    assert_eq!(online.optimize_calls, 1);
    assert_eq!(online.last_actions, vec![ACTION_FORWARD; 3]);
    let mut targets = online.last_targets.clone().unwrap().to_vec();
    targets.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let expected = [10.0, 29.9 + 0.5 * 5.0, 29.9 + 0.5 * 5.0];
    for (actual, expected) in targets.iter().zip(expected.iter()) {
        assert!((actual - expected).abs() < 1e-4, "{} vs {}", actual, expected);
    }
}

#[test]
fn test_training_needs_enough_transitions() {
    let mut agent = greedy_agent(10, array![5.0, 0.0, 0.0]);
    agent.play_step().unwrap();
    let result = agent.train_on_replay_batch(2, 0.9);
    assert!(matches!(
        result,
        Err(PilotError::InsufficientData { requested: 2, available: 1 })
    ));
}

#[test]
fn test_sync_target_copies_online() {
    let mut agent = greedy_agent(10, array![1.0, 0.0, 0.0]);
    agent.online_mut().values = array![0.0, 7.0, 0.0];
    assert_ne!(agent.target().values, agent.online().values);

    agent.sync_target().unwrap();
    assert_eq!(agent.target().values, array![0.0, 7.0, 0.0]);
}

#[test]
fn test_mismatched_network_is_rejected() {
    let result = Agent::new(
        Corridor::new(10, 50),
        FixedValues::new(array![0.0, 0.0, 0.0, 0.0]),
        FixedValues::new(array![0.0, 0.0, 0.0, 0.0]),
        ExplorationSchedule::new(0.5, 0.1, 10),
        reward_config(),
        10,
        StdRng::seed_from_u64(0),
    );
    assert!(matches!(result, Err(PilotError::DimensionMismatch { .. })));
}

#[test]
fn test_step_reports_environment_progress() {
    let mut agent = greedy_agent(10, array![5.0, 0.0, 0.0]);
    agent.play_step().unwrap();
    agent.play_step().unwrap();
    assert_eq!(agent.env().position(), 2.0);
    assert_eq!(agent.episode().stats().furthest_distance, 2.0);
}
