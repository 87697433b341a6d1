//! # Carpilot - Deep Q-Learning for a Simulated Driving Agent
//!
//! Carpilot trains a car to drive along a multi-lane road with an
//! off-policy DQN engine: a fixed-capacity replay buffer, a linearly
//! annealed epsilon-greedy policy, checkpoint-based reward shaping and an
//! online/target network pair with periodic hard synchronisation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carpilot::agent::Agent;
//! use carpilot::config::TrainerConfig;
//! use carpilot::env::{Highway, HighwayConfig};
//! use carpilot::network::QNetwork;
//! use carpilot::trainer::Trainer;
//!
//! let config = TrainerConfig::default();
//! let env = Highway::new(HighwayConfig::default(), 0).unwrap();
//! let build = || {
//!     QNetwork::builder()
//!         .input_size(5)
//!         .hidden_layers(&config.hidden_layer_sizes)
//!         .hidden_activation(config.hidden_activation)
//!         .num_actions(3)
//!         .learning_rate(config.learning_rate)
//!         .build()
//!         .unwrap()
//! };
//! let agent = Agent::from_config(env, build(), build(), &config).unwrap();
//! let mut trainer = Trainer::new(agent, config).unwrap();
//! let report = trainer.run().unwrap();
//! println!("stopped after {} frames: {}", report.frames, report.stop_reason);
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - Frame-level interaction and the replay training step
//! - [`config`] - Trainer options with JSON loading and validation
//! - [`env`] - The environment trait plus the highway and corridor worlds
//! - [`error`] - Error types and result handling
//! - [`evaluate`] - Greedy playback of a trained network
//! - [`exploration`] - Linear epsilon schedule
//! - [`metrics`] - Moving averages over finished episodes
//! - [`network`] - Value-function interface and the bundled MLP
//! - [`replay_buffer`] - Experience replay
//! - [`reward`] - Checkpoint tracking and reward shaping
//! - [`summary`] - Scalar CSV summaries
//! - [`trainer`] - The outer training loop

pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod evaluate;
pub mod exploration;
pub mod metrics;
pub mod network;
pub mod replay_buffer;
pub mod reward;
pub mod summary;
pub mod trainer;

pub use error::{PilotError, Result};

#[cfg(test)]
mod tests;
