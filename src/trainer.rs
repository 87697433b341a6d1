//! # Training loop
//!
//! [`Trainer`] pre-fills the replay buffer, then alternates one optimisation
//! step with one environment frame until a stopping condition holds at an
//! episode boundary. The online network is copied into the target network
//! whenever the agent's frame count hits a multiple of `sync_every_frames`.
//!
//! Every episode that reaches the goal feeds two moving averages (return
//! and distance); crashed episodes are not recorded.
//! A strictly better return average writes the online network to
//! `save_path`; a failed write is logged and training carries on.

use log::{debug, info, warn};
use std::fmt;
use std::time::Instant;

use crate::agent::{Agent, StepOutcome};
use crate::config::TrainerConfig;
use crate::env::Environment;
use crate::error::Result;
use crate::metrics::MovingAverager;
use crate::network::ValueFunction;
use crate::summary::SummaryWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The windowed average return reached the configured threshold.
    RewardThreshold,
    /// The agent played `max_num_frames` frames.
    FrameBudget,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RewardThreshold => write!(f, "reward threshold reached"),
            StopReason::FrameBudget => write!(f, "frame budget exhausted"),
        }
    }
}

/// Bookkeeping for one finished episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub index: usize,
    pub frame_count: u64,
    pub cumulative_reward: f32,
    pub furthest_distance: f32,
    pub average_reward: f32,
    pub average_distance: f32,
    pub epsilon: f32,
    pub frames_per_second: f32,
    /// Whether this episode produced a new best checkpoint.
    pub new_best: bool,
    /// Whether that checkpoint reached disk.
    pub saved: bool,
}

/// Result of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Iteration {
    pub loss: f32,
    pub outcome: StepOutcome,
    pub episode: Option<EpisodeSummary>,
    pub synced: bool,
    pub stop: Option<StopReason>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub frames: u64,
    pub episodes: usize,
    pub best_average_reward: f32,
    pub final_average_reward: Option<f32>,
    pub final_average_distance: Option<f32>,
    pub stop_reason: StopReason,
}

pub struct Trainer<E, V> {
    agent: Agent<E, V>,
    config: TrainerConfig,
    reward_averager: MovingAverager,
    distance_averager: MovingAverager,
    best_average_reward: f32,
    episodes: usize,
    prefilled: bool,
    summary: Option<SummaryWriter>,
    last_episode_frame: u64,
    last_episode_time: Instant,
}

impl<E: Environment, V: ValueFunction> Trainer<E, V> {
    pub fn new(agent: Agent<E, V>, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let summary = match &config.log_dir {
            Some(dir) => match SummaryWriter::create(dir) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    warn!("Summaries disabled, cannot open {}: {}", dir.display(), e);
                    None
                }
            },
            None => None,
        };
        let window = config.averager_window;
        let frame = agent.frame_count();
        Ok(Trainer {
            agent,
            config,
            reward_averager: MovingAverager::new(window),
            distance_averager: MovingAverager::new(window),
            best_average_reward: f32::NEG_INFINITY,
            episodes: 0,
            prefilled: false,
            summary,
            last_episode_frame: frame,
            last_episode_time: Instant::now(),
        })
    }

    /// Fill the replay buffer with `replay_buffer_size` exploratory frames.
    /// Episodes ending here are not counted and no sync happens.
    pub fn prefill(&mut self) -> Result<()> {
        let target = self.config.replay_buffer_size;
        let report_every = (target / 10).max(1);
        for i in 0..target {
            self.agent.play_step()?;
            if (i + 1) % report_every == 0 {
                debug!("Pre-filled {}/{} transitions", i + 1, target);
            }
        }
        self.prefilled = true;
        self.last_episode_frame = self.agent.frame_count();
        self.last_episode_time = Instant::now();
        Ok(())
    }

    /// One optimisation step, one frame, then the sync check.
    pub fn step(&mut self) -> Result<Iteration> {
        let loss = self
            .agent
            .train_on_replay_batch(self.config.batch_size, self.config.gamma)?;
        debug!("Frame #{}: loss={:.6}", self.agent.frame_count(), loss);

        let outcome = self.agent.play_step()?;
        let mut episode = None;
        let mut stop = None;
        // Crashed episodes are reset by the agent without being recorded.
        if outcome.done {
            let summary = self.finish_episode(&outcome);
            stop = self.stop_reason(summary.average_reward);
            episode = Some(summary);
        } else if outcome.dead {
            debug!(
                "Frame #{}: crashed after {} frames (reward {:.1}, not recorded)",
                self.agent.frame_count(),
                outcome.episode_frames,
                outcome.cumulative_reward
            );
        }

        let mut synced = false;
        if stop.is_none() && self.agent.frame_count() % self.config.sync_every_frames == 0 {
            self.agent.sync_target()?;
            synced = true;
            info!("Sync'ed weights from online network to target network");
        }

        Ok(Iteration {
            loss,
            outcome,
            episode,
            synced,
            stop,
        })
    }

    /// Pre-fill if needed, then iterate until a stopping condition holds.
    pub fn run(&mut self) -> Result<TrainingReport> {
        info!(
            "Training: batchSize={}, gamma={}, replayBufferSize={}, syncEveryFrames={}, maxNumFrames={}",
            self.config.batch_size,
            self.config.gamma,
            self.config.replay_buffer_size,
            self.config.sync_every_frames,
            self.config.max_num_frames
        );
        if !self.prefilled {
            self.prefill()?;
        }
        loop {
            let iteration = self.step()?;
            if let Some(reason) = iteration.stop {
                info!(
                    "Stopping at frame #{} after {} episodes: {}",
                    self.agent.frame_count(),
                    self.episodes,
                    reason
                );
                return Ok(self.report(reason));
            }
        }
    }

    fn finish_episode(&mut self, outcome: &StepOutcome) -> EpisodeSummary {
        self.episodes += 1;
        self.reward_averager.append(outcome.cumulative_reward);
        self.distance_averager.append(outcome.furthest_distance);
        let average_reward = self.reward_averager.average().unwrap_or(outcome.cumulative_reward);
        let average_distance = self.distance_averager.average().unwrap_or(outcome.furthest_distance);

        let frame_count = self.agent.frame_count();
        let elapsed = self.last_episode_time.elapsed().as_secs_f32();
        let frames_per_second = if elapsed > 0.0 {
            (frame_count - self.last_episode_frame) as f32 / elapsed
        } else {
            0.0
        };
        self.last_episode_frame = frame_count;
        self.last_episode_time = Instant::now();

        info!(
            "Frame #{}: cumulativeReward100={:.1}; distance100={:.1}; furthest={:.1}; epsilon={:.3}; {:.1} frames/s",
            frame_count,
            average_reward,
            average_distance,
            outcome.furthest_distance,
            outcome.epsilon,
            frames_per_second
        );

        if let Some(writer) = self.summary.as_mut() {
            let scalars = [
                ("cumulativeReward100", average_reward),
                ("distance100", average_distance),
                ("epsilon", outcome.epsilon),
                ("framesPerSecond", frames_per_second),
            ];
            if let Err(e) = writer.add_scalars(&scalars, frame_count) {
                warn!("Failed to write summary to {}: {}", writer.path().display(), e);
            }
        }

        let new_best = average_reward > self.best_average_reward;
        let mut saved = false;
        if new_best {
            self.best_average_reward = average_reward;
            match self.agent.save_online(&self.config.save_path) {
                Ok(()) => {
                    saved = true;
                    info!(
                        "Saved network to {} (cumulativeReward100={:.1})",
                        self.config.save_path.display(),
                        average_reward
                    );
                }
                Err(e) => warn!(
                    "Failed to save network to {}: {}",
                    self.config.save_path.display(),
                    e
                ),
            }
        }

        EpisodeSummary {
            index: self.episodes,
            frame_count,
            cumulative_reward: outcome.cumulative_reward,
            furthest_distance: outcome.furthest_distance,
            average_reward,
            average_distance,
            epsilon: outcome.epsilon,
            frames_per_second,
            new_best,
            saved,
        }
    }

    fn stop_reason(&self, average_reward: f32) -> Option<StopReason> {
        if average_reward >= self.config.cumulative_reward_threshold {
            Some(StopReason::RewardThreshold)
        } else if self.agent.frame_count() >= self.config.max_num_frames {
            Some(StopReason::FrameBudget)
        } else {
            None
        }
    }

    fn report(&self, stop_reason: StopReason) -> TrainingReport {
        TrainingReport {
            frames: self.agent.frame_count(),
            episodes: self.episodes,
            best_average_reward: self.best_average_reward,
            final_average_reward: self.reward_averager.average(),
            final_average_distance: self.distance_averager.average(),
            stop_reason,
        }
    }

    pub fn agent(&self) -> &Agent<E, V> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent<E, V> {
        &mut self.agent
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    pub fn best_average_reward(&self) -> f32 {
        self.best_average_reward
    }

    pub fn reward_averager(&self) -> &MovingAverager {
        &self.reward_averager
    }

    pub fn distance_averager(&self) -> &MovingAverager {
        &self.distance_averager
    }

    pub fn into_agent(self) -> Agent<E, V> {
        self.agent
    }
}
