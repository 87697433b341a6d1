use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PilotError, Result};
use crate::exploration::ExplorationSchedule;
use crate::network::Activation;
use crate::reward::RewardConfig;

/// Options consumed when the trainer is built.
///
/// Field names serialise in camelCase, so a JSON file reads like
/// `{"batchSize": 64, "epsilonDecayFrames": 200000, "reward": {"numCheckpoints": 3000}}`.
/// Missing fields fall back to [`TrainerConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainerConfig {
    pub batch_size: usize,
    /// Reward discount, 0 < gamma <= 1.
    pub gamma: f32,
    pub learning_rate: f32,
    /// Stop once the windowed average return reaches this value.
    pub cumulative_reward_threshold: f32,
    /// Stop once this many environment frames have been played.
    pub max_num_frames: u64,
    /// Replay capacity, also the number of pre-fill steps.
    pub replay_buffer_size: usize,
    pub epsilon_init: f32,
    pub epsilon_final: f32,
    pub epsilon_decay_frames: u64,
    pub sync_every_frames: u64,
    /// Where the best network so far is written.
    pub save_path: PathBuf,
    /// Directory for the scalar summary stream; disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub hidden_layer_sizes: Vec<usize>,
    /// Activation of every hidden layer; the output layer is always linear.
    pub hidden_activation: Activation,
    pub averager_window: usize,
    pub seed: Option<u64>,
    pub reward: RewardConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            batch_size: 64,
            gamma: 0.99,
            learning_rate: 1e-3,
            cumulative_reward_threshold: 700.0,
            max_num_frames: 1_000_000,
            replay_buffer_size: 100_000,
            epsilon_init: 0.5,
            epsilon_final: 0.08,
            epsilon_decay_frames: 200_000,
            sync_every_frames: 1_000,
            save_path: PathBuf::from("models/dqn.bin"),
            log_dir: None,
            hidden_layer_sizes: vec![10],
            hidden_activation: Activation::Relu,
            averager_window: 100,
            seed: None,
            reward: RewardConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: TrainerConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn exploration(&self) -> ExplorationSchedule {
        ExplorationSchedule::new(self.epsilon_init, self.epsilon_final, self.epsilon_decay_frames)
    }

    /// Reject settings that would make training ill-defined.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PilotError::invalid_parameter("batchSize", "must be positive"));
        }
        if self.batch_size > self.replay_buffer_size {
            return Err(PilotError::invalid_parameter(
                "batchSize".to_string(),
                format!(
                    "batch size {} exceeds replay buffer size {}",
                    self.batch_size, self.replay_buffer_size
                ),
            ));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(PilotError::invalid_parameter("gamma", "must lie in (0, 1]"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PilotError::invalid_parameter("learningRate", "must be positive"));
        }
        if self.sync_every_frames == 0 {
            return Err(PilotError::invalid_parameter("syncEveryFrames", "must be positive"));
        }
        if self.epsilon_decay_frames == 0 {
            return Err(PilotError::invalid_parameter("epsilonDecayFrames", "must be positive"));
        }
        for (name, epsilon) in [("epsilonInit", self.epsilon_init), ("epsilonFinal", self.epsilon_final)] {
            if !(0.0..=1.0).contains(&epsilon) {
                return Err(PilotError::invalid_parameter(name, "must lie in [0, 1]"));
            }
        }
        if self.averager_window == 0 {
            return Err(PilotError::invalid_parameter("averagerWindow", "must be positive"));
        }
        if self.hidden_layer_sizes.is_empty() || self.hidden_layer_sizes.iter().any(|&s| s == 0) {
            return Err(PilotError::invalid_parameter(
                "hiddenLayerSizes",
                "needs at least one hidden layer, each of positive size",
            ));
        }
        if let Activation::Linear = self.hidden_activation {
            return Err(PilotError::invalid_parameter(
                "hiddenActivation",
                "hidden layers need a non-linear activation",
            ));
        }
        self.reward.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        TrainerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_batch_larger_than_buffer_rejected() {
        let config = TrainerConfig {
            batch_size: 128,
            replay_buffer_size: 64,
            ..TrainerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PilotError::InvalidParameter { ref name, .. }) if name == "batchSize"
        ));
    }

    #[test]
    fn test_gamma_range() {
        for gamma in [0.0, 1.5, f32::NAN] {
            let config = TrainerConfig { gamma, ..TrainerConfig::default() };
            assert!(config.validate().is_err());
        }
        let config = TrainerConfig { gamma: 1.0, ..TrainerConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"batchSize": 32, "logDir": "runs/a", "reward": {"stepPenalty": 0.03}}"#;
        let config: TrainerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.log_dir, Some(PathBuf::from("runs/a")));
        assert_eq!(config.reward.step_penalty, 0.03);
        assert_eq!(config.reward.num_checkpoints, 3000);
        assert_eq!(config.sync_every_frames, 1000);
    }

    #[test]
    fn test_hidden_layers_required() {
        for sizes in [vec![], vec![10, 0]] {
            let config = TrainerConfig {
                hidden_layer_sizes: sizes,
                ..TrainerConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PilotError::InvalidParameter { ref name, .. }) if name == "hiddenLayerSizes"
            ));
        }
    }

    #[test]
    fn test_hidden_activation_from_json() {
        let json = r#"{"hiddenActivation": {"LeakyRelu": {"alpha": 0.01}}}"#;
        let config: TrainerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.hidden_activation, Activation::LeakyRelu { alpha: 0.01 });
        assert!(config.validate().is_ok());

        let json = r#"{"hiddenActivation": "Tanh"}"#;
        let config: TrainerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.hidden_activation, Activation::Tanh);

        let linear = TrainerConfig {
            hidden_activation: Activation::Linear,
            ..TrainerConfig::default()
        };
        assert!(linear.validate().is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TrainerConfig {
            seed: Some(3),
            ..TrainerConfig::default()
        };
        config.to_json_file(&path).unwrap();
        assert_eq!(TrainerConfig::from_json_file(&path).unwrap(), config);
    }
}
