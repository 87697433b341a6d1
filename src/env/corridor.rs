use ndarray::array;

use super::{Environment, Route, State, StepStatus};
use crate::error::{PilotError, Result};

pub const ACTION_FORWARD: usize = 0;
pub const ACTION_WAIT: usize = 1;
pub const ACTION_BACK: usize = 2;

/// A straight corridor of `length` cells.
///
/// Moving forward past the last cell reaches the goal, stepping back
/// behind the first cell or exceeding `max_steps` is a failure.
#[derive(Clone, Debug)]
pub struct Corridor {
    length: usize,
    max_steps: usize,
    position: i64,
    steps: usize,
}

impl Corridor {
    pub fn new(length: usize, max_steps: usize) -> Self {
        Corridor {
            length: length.max(1),
            max_steps: max_steps.max(1),
            position: 0,
            steps: 0,
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn observe(&self) -> State {
        let fraction = self.position as f32 / self.length as f32;
        array![fraction, 1.0 - fraction]
    }
}

impl Environment for Corridor {
    fn reset(&mut self) -> Result<State> {
        self.position = 0;
        self.steps = 0;
        Ok(self.observe())
    }

    fn step(&mut self, action: usize) -> Result<(StepStatus, State)> {
        self.position += match action {
            ACTION_FORWARD => 1,
            ACTION_WAIT => 0,
            ACTION_BACK => -1,
            _ => {
                return Err(PilotError::InvalidAction {
                    action,
                    num_actions: self.num_actions(),
                })
            }
        };
        self.steps += 1;

        let status = if self.position >= self.length as i64 {
            StepStatus::Done
        } else if self.position < 0 || self.steps >= self.max_steps {
            StepStatus::Dead
        } else {
            StepStatus::Running
        };
        Ok((status, self.observe()))
    }

    fn num_actions(&self) -> usize {
        3
    }

    fn observation_size(&self) -> usize {
        2
    }

    fn position(&self) -> f32 {
        self.position as f32
    }

    fn route(&self) -> Route {
        Route::new(0.0, self.length as f32)
    }
}
