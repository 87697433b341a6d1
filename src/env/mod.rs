//! # Environments
//!
//! The trainer only talks to an environment through the [`Environment`]
//! trait: reset it, step it with a discrete action, and read back where the
//! car is along its route. Two implementations ship with the crate:
//!
//! - [`Highway`]: a lane-driving simulator with traffic and ray sensors
//! - [`Corridor`]: a deterministic 1-D toy world for tests and benches

pub mod corridor;
pub mod highway;

pub use corridor::Corridor;
pub use highway::{Highway, HighwayConfig};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Observation vector handed to the value function.
pub type State = Array1<f32>;

/// Outcome of a single environment step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Running,
    /// Goal reached.
    Done,
    /// Crashed or ran out of time.
    Dead,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Running)
    }
}

/// Start and goal of the route along the longitudinal axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub start_position: f32,
    pub goal_position: f32,
}

impl Route {
    pub fn new(start_position: f32, goal_position: f32) -> Self {
        Route {
            start_position,
            goal_position,
        }
    }

    pub fn length(&self) -> f32 {
        (self.goal_position - self.start_position).abs()
    }

    /// Distance covered from the start towards the goal. Negative when the
    /// car has moved away from the goal.
    pub fn progress(&self, position: f32) -> f32 {
        if self.goal_position >= self.start_position {
            position - self.start_position
        } else {
            self.start_position - position
        }
    }
}

/// A simulated world the agent drives in.
pub trait Environment {
    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> Result<State>;

    /// Advance one frame with `action`.
    fn step(&mut self, action: usize) -> Result<(StepStatus, State)>;

    fn num_actions(&self) -> usize;

    fn observation_size(&self) -> usize;

    /// Current longitudinal position of the car.
    fn position(&self) -> f32;

    fn route(&self) -> Route;

    fn progress(&self) -> f32 {
        self.route().progress(self.position())
    }
}
