//! # Driving agent
//!
//! The [`Agent`] owns everything that lives for a whole training run: the
//! environment handle, the online and target value functions, the replay
//! buffer, the exploration schedule and the frame counter. State that only
//! lives for one episode (checkpoint tracker, running return, furthest
//! distance) sits in a separate [`Episode`] that is rebuilt at every
//! episode boundary, so nothing leaks from one episode into the next.
//!
//! ```rust,no_run
//! use carpilot::agent::Agent;
//! use carpilot::config::TrainerConfig;
//! use carpilot::env::Corridor;
//! use carpilot::network::QNetwork;
//!
//! let config = TrainerConfig { replay_buffer_size: 1000, batch_size: 32, ..TrainerConfig::default() };
//! let env = Corridor::new(10, 50);
//! let build = || QNetwork::builder().input_size(2).num_actions(3).build().unwrap();
//! let mut agent = Agent::from_config(env, build(), build(), &config).unwrap();
//! for _ in 0..config.batch_size {
//!     agent.play_step().unwrap();
//! }
//! let loss = agent.train_on_replay_batch(config.batch_size, config.gamma).unwrap();
//! println!("loss {}", loss);
//! ```

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use crate::config::TrainerConfig;
use crate::env::{Environment, State, StepStatus};
use crate::error::{PilotError, Result};
use crate::exploration::ExplorationSchedule;
use crate::network::ValueFunction;
use crate::replay_buffer::{ReplayBuffer, Transition};
use crate::reward::{CheckpointTracker, RewardConfig, RewardShaper};

/// Running statistics of the current episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeStats {
    pub cumulative_reward: f32,
    pub furthest_distance: f32,
    pub start_frame: u64,
}

impl EpisodeStats {
    fn new(start_frame: u64) -> Self {
        EpisodeStats {
            cumulative_reward: 0.0,
            furthest_distance: 0.0,
            start_frame,
        }
    }

    fn record(&mut self, reward: f32, progress: f32) {
        self.cumulative_reward += reward;
        if progress > self.furthest_distance {
            self.furthest_distance = progress;
        }
    }
}

/// Episode-scoped state, reset at every episode boundary.
#[derive(Clone, Debug)]
pub struct Episode {
    tracker: CheckpointTracker,
    stats: EpisodeStats,
}

impl Episode {
    fn new(num_checkpoints: usize, start_frame: u64) -> Self {
        Episode {
            tracker: CheckpointTracker::new(num_checkpoints),
            stats: EpisodeStats::new(start_frame),
        }
    }

    fn reset(&mut self, start_frame: u64) {
        self.tracker.reset();
        self.stats = EpisodeStats::new(start_frame);
    }

    pub fn tracker(&self) -> &CheckpointTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }
}

/// What one call to [`Agent::play_step`] observed, captured before any
/// episode reset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub action: usize,
    pub reward: f32,
    pub status: StepStatus,
    pub done: bool,
    pub dead: bool,
    /// Epsilon used to pick `action`.
    pub epsilon: f32,
    pub cumulative_reward: f32,
    pub furthest_distance: f32,
    /// Frames played in this episode, including this one.
    pub episode_frames: u64,
}

impl StepOutcome {
    pub fn episode_ended(&self) -> bool {
        self.done || self.dead
    }
}

pub struct Agent<E, V> {
    env: E,
    online: V,
    target: V,
    replay: ReplayBuffer,
    schedule: ExplorationSchedule,
    shaper: RewardShaper,
    frame_count: u64,
    epsilon: f32,
    state: State,
    episode: Episode,
    rng: StdRng,
}

impl<E: Environment, V: ValueFunction> Agent<E, V> {
    /// Create an agent. `target` is overwritten with `online`'s parameters.
    pub fn new(
        mut env: E,
        online: V,
        mut target: V,
        schedule: ExplorationSchedule,
        reward: RewardConfig,
        replay_capacity: usize,
        rng: StdRng,
    ) -> Result<Self> {
        reward.validate()?;
        if replay_capacity == 0 {
            return Err(PilotError::invalid_parameter("replay_capacity", "must be positive"));
        }
        if env.num_actions() != online.num_actions() {
            return Err(PilotError::dimension_mismatch(
                format!("{} network outputs", env.num_actions()),
                format!("{}", online.num_actions()),
            ));
        }
        if env.observation_size() != online.input_size() {
            return Err(PilotError::dimension_mismatch(
                format!("{} network inputs", env.observation_size()),
                format!("{}", online.input_size()),
            ));
        }
        online.clone_weights_into(&mut target)?;

        let shaper = RewardShaper::new(reward, env.route());
        let state = env.reset()?;
        Ok(Agent {
            env,
            online,
            target,
            replay: ReplayBuffer::new(replay_capacity),
            schedule,
            shaper,
            frame_count: 0,
            epsilon: schedule.epsilon(0),
            state,
            episode: Episode::new(reward.num_checkpoints, 0),
            rng,
        })
    }

    pub fn from_config(env: E, online: V, target: V, config: &TrainerConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(
            env,
            online,
            target,
            config.exploration(),
            config.reward,
            config.replay_buffer_size,
            rng,
        )
    }

    /// Play one frame and store the resulting transition.
    pub fn play_step(&mut self) -> Result<StepOutcome> {
        let epsilon = self.schedule.epsilon(self.frame_count);
        self.epsilon = epsilon;
        self.frame_count += 1;

        let action = if self.rng.gen::<f32>() < epsilon {
            self.rng.gen_range(0..self.online.num_actions())
        } else {
            self.online.greedy_action(self.state.view())?
        };

        let (status, next_state) = self.env.step(action)?;
        if next_state.len() != self.online.input_size() {
            return Err(PilotError::dimension_mismatch(
                format!("{} state features", self.online.input_size()),
                format!("{}", next_state.len()),
            ));
        }
        let progress = self.env.progress();
        let reward = self.shaper.reward(status, progress, &mut self.episode.tracker);
        let terminal = status.is_terminal();

        let state = std::mem::replace(&mut self.state, next_state.clone());
        self.replay.append(Transition {
            state,
            action,
            reward,
            terminal,
            next_state,
        });
        self.episode.stats.record(reward, progress);

        let stats = self.episode.stats;
        let outcome = StepOutcome {
            action,
            reward,
            status,
            done: status == StepStatus::Done,
            dead: status == StepStatus::Dead,
            epsilon,
            cumulative_reward: stats.cumulative_reward,
            furthest_distance: stats.furthest_distance,
            episode_frames: self.frame_count - stats.start_frame,
        };

        if terminal {
            self.start_episode()?;
        }
        Ok(outcome)
    }

    /// Regress the online network towards targets bootstrapped from the
    /// target network on a uniformly sampled minibatch. Returns the loss.
    pub fn train_on_replay_batch(&mut self, batch_size: usize, gamma: f32) -> Result<f32> {
        let batch = self.replay.sample(batch_size, &mut self.rng)?;
        let input_size = self.online.input_size();

        let mut states = Array2::<f32>::zeros((batch_size, input_size));
        let mut next_states = Array2::<f32>::zeros((batch_size, input_size));
        let mut actions = Vec::with_capacity(batch_size);
        for (i, transition) in batch.iter().enumerate() {
            states.row_mut(i).assign(&transition.state);
            next_states.row_mut(i).assign(&transition.next_state);
            actions.push(transition.action);
        }

        let next_values = self.target.predict(next_states.view())?;
        let targets = Array1::from_iter(batch.iter().zip(next_values.rows()).map(|(transition, values)| {
            if transition.terminal {
                transition.reward
            } else {
                let max_next = values.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                transition.reward + gamma * max_next
            }
        }));

        self.online.optimize_step(states.view(), &actions, targets.view())
    }

    /// Hard-copy the online parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.online.clone_weights_into(&mut self.target)
    }

    /// Persist the online network.
    pub fn save_online(&self, path: &Path) -> Result<()> {
        self.online.save(path)
    }

    fn start_episode(&mut self) -> Result<()> {
        self.state = self.env.reset()?;
        self.episode.reset(self.frame_count);
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Epsilon used by the most recent step.
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    pub fn shaper(&self) -> &RewardShaper {
        &self.shaper
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.replay
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn online(&self) -> &V {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut V {
        &mut self.online
    }

    pub fn target(&self) -> &V {
        &self.target
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn current_state(&self) -> &State {
        &self.state
    }

    pub fn into_parts(self) -> (E, V, V) {
        (self.env, self.online, self.target)
    }
}
