use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use carpilot::agent::Agent;
use carpilot::config::TrainerConfig;
use carpilot::env::{Environment, Highway, HighwayConfig};
use carpilot::evaluate::evaluate;
use carpilot::network::{QNetwork, ValueFunction};
use carpilot::trainer::Trainer;
use carpilot::Result;

#[derive(Parser, Debug)]
#[command(name = "carpilot")]
#[command(version)]
#[command(about = "Train and evaluate a DQN driving agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a network on the highway environment
    Train(TrainArgs),
    /// Drive greedily with a saved network
    Evaluate(EvaluateArgs),
}

#[derive(Parser, Debug)]
struct TrainArgs {
    /// JSON trainer configuration; omitted options use their defaults
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON highway configuration
    #[arg(long = "env-config", value_name = "PATH")]
    env_config: Option<PathBuf>,

    #[arg(long = "batch-size")]
    batch_size: Option<usize>,

    #[arg(long)]
    gamma: Option<f32>,

    #[arg(long = "learning-rate")]
    learning_rate: Option<f32>,

    #[arg(long = "cumulative-reward-threshold")]
    cumulative_reward_threshold: Option<f32>,

    #[arg(long = "max-num-frames")]
    max_num_frames: Option<u64>,

    #[arg(long = "replay-buffer-size")]
    replay_buffer_size: Option<usize>,

    #[arg(long = "epsilon-init")]
    epsilon_init: Option<f32>,

    #[arg(long = "epsilon-final")]
    epsilon_final: Option<f32>,

    #[arg(long = "epsilon-decay-frames")]
    epsilon_decay_frames: Option<u64>,

    #[arg(long = "sync-every-frames")]
    sync_every_frames: Option<u64>,

    /// Where the best network is written
    #[arg(long = "save-path", value_name = "PATH")]
    save_path: Option<PathBuf>,

    /// Directory for scalar summaries
    #[arg(long = "log-dir", value_name = "PATH")]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,
}

impl TrainArgs {
    fn apply(&self, config: &mut TrainerConfig) {
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.gamma {
            config.gamma = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.cumulative_reward_threshold {
            config.cumulative_reward_threshold = v;
        }
        if let Some(v) = self.max_num_frames {
            config.max_num_frames = v;
        }
        if let Some(v) = self.replay_buffer_size {
            config.replay_buffer_size = v;
        }
        if let Some(v) = self.epsilon_init {
            config.epsilon_init = v;
        }
        if let Some(v) = self.epsilon_final {
            config.epsilon_final = v;
        }
        if let Some(v) = self.epsilon_decay_frames {
            config.epsilon_decay_frames = v;
        }
        if let Some(v) = self.sync_every_frames {
            config.sync_every_frames = v;
        }
        if let Some(path) = &self.save_path {
            config.save_path = path.clone();
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

#[derive(Parser, Debug)]
struct EvaluateArgs {
    /// Saved network
    #[arg(long, value_name = "PATH", default_value = "models/dqn.bin")]
    model: PathBuf,

    /// JSON trainer configuration, read for its reward settings
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long = "env-config", value_name = "PATH")]
    env_config: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    episodes: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn load_highway_config(path: Option<&Path>) -> Result<HighwayConfig> {
    match path {
        Some(path) => {
            let data = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        }
        None => Ok(HighwayConfig::default()),
    }
}

fn load_trainer_config(path: Option<&Path>) -> Result<TrainerConfig> {
    match path {
        Some(path) => TrainerConfig::from_json_file(path),
        None => Ok(TrainerConfig::default()),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = load_trainer_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random);
    config.seed = Some(seed);
    info!("Seed {}", seed);
    let env = Highway::new(load_highway_config(args.env_config.as_deref())?, seed)?;
    let build = |seed: u64| {
        QNetwork::builder()
            .input_size(env.observation_size())
            .hidden_layers(&config.hidden_layer_sizes)
            .hidden_activation(config.hidden_activation)
            .num_actions(env.num_actions())
            .learning_rate(config.learning_rate)
            .seed(seed)
            .build()
    };
    let online = build(seed)?;
    let target = build(seed.wrapping_add(1))?;

    let agent = Agent::from_config(env, online, target, &config)?;
    let mut trainer = Trainer::new(agent, config)?;
    let report = trainer.run()?;
    info!(
        "Finished: {} frames, {} episodes, best cumulativeReward100={:.1}, {}",
        report.frames, report.episodes, report.best_average_reward, report.stop_reason
    );
    Ok(())
}

fn run_evaluation(args: EvaluateArgs) -> Result<()> {
    let config = load_trainer_config(args.config.as_deref())?;
    let network = QNetwork::load(&args.model)?;
    let mut env = Highway::new(load_highway_config(args.env_config.as_deref())?, args.seed)?;
    let report = evaluate(&mut env, &network, args.episodes, config.reward)?;
    info!(
        "Evaluated {} episodes: {} reached the goal, {} failed; mean reward={:.1}; mean distance={:.1}",
        report.episodes(),
        report.successes,
        report.failures,
        report.mean_reward().unwrap_or(0.0),
        report.mean_distance().unwrap_or(0.0)
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Train(args) => train(args),
        Commands::Evaluate(args) => run_evaluation(args),
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
