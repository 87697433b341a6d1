use serde::{Deserialize, Serialize};

/// Linear epsilon decay from `epsilon_init` to `epsilon_final`.
///
/// Epsilon is a pure function of the frame counter; the counter itself
/// lives with the agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    pub epsilon_init: f32,
    pub epsilon_final: f32,
    pub epsilon_decay_frames: u64,
}

impl ExplorationSchedule {
    pub fn new(epsilon_init: f32, epsilon_final: f32, epsilon_decay_frames: u64) -> Self {
        ExplorationSchedule {
            epsilon_init,
            epsilon_final,
            epsilon_decay_frames,
        }
    }

    /// Exploration probability after `frame_count` environment steps.
    pub fn epsilon(&self, frame_count: u64) -> f32 {
        if frame_count >= self.epsilon_decay_frames {
            return self.epsilon_final;
        }
        let fraction = frame_count as f64 / self.epsilon_decay_frames as f64;
        let init = self.epsilon_init as f64;
        let delta = self.epsilon_final as f64 - init;
        (init + delta * fraction) as f32
    }
}
