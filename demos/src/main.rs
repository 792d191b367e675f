//! Self-play training demo on the built-in race game.
//!
//! ```bash
//! # Defaults: 4 actors, 1000 episodes, 2-player race to square 20
//! cargo run --release --bin selfplay
//!
//! # Bootstrap with heuristic actors, 3 players, fixed seed
//! RUST_LOG=selfplay_rl=debug cargo run --release --bin selfplay -- \
//!     --players 3 --bootstrap-episodes 100 --seed 42
//!
//! # Start from a JSON config; flags override it
//! cargo run --release --bin selfplay -- --config run.json --num-actors 8
//! ```

use anyhow::Context;
use clap::Parser;
use selfplay_rl::toy::RaceComponents;
use selfplay_rl::{Orchestrator, OrchestratorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Self-play actor/trainer run on a multiplayer race game
#[derive(Parser, Debug)]
#[command(name = "selfplay")]
#[command(about = "Distributed self-play training on a toy race game", long_about = None)]
struct Args {
    /// JSON run configuration; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Actor pool size
    #[arg(long)]
    num_actors: Option<usize>,

    /// Results to process before shutting down
    #[arg(long)]
    num_episodes: Option<u64>,

    /// Results generated by heuristic actors before switching to search
    #[arg(long)]
    bootstrap_episodes: Option<u64>,

    /// Master seed for job seeds
    #[arg(long)]
    seed: Option<u64>,

    /// Checkpoint base path to warm-start from
    #[arg(long)]
    load_model_path: Option<PathBuf>,

    /// Checkpoint base path to write
    #[arg(long)]
    save_model_path: Option<PathBuf>,

    /// Number of racers
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Square that wins the race
    #[arg(long, default_value_t = 20)]
    target: u32,
}

impl Args {
    fn run_config(&self) -> anyhow::Result<OrchestratorConfig> {
        let mut config = match &self.config {
            Some(path) => OrchestratorConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => OrchestratorConfig::default(),
        };
        // Assigned directly so a zero pool reaches validation as an error.
        if let Some(n) = self.num_actors {
            config.num_actors = n;
        }
        if let Some(n) = self.num_episodes {
            config = config.with_num_episodes(n);
        }
        if let Some(n) = self.bootstrap_episodes {
            config = config.with_bootstrap_episodes(n);
        }
        if let Some(seed) = self.seed {
            config = config.with_master_seed(seed);
        }
        if let Some(path) = &self.load_model_path {
            config = config.with_load_model_path(path);
        }
        if let Some(path) = &self.save_model_path {
            config = config.with_save_model_path(path);
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let config = args.run_config()?;
    let components = RaceComponents::new(args.players, args.target, config.trainer.learning_rate);

    let mut orchestrator = Orchestrator::new(config, components);
    let summary = orchestrator.run().context("self-play run failed")?;

    info!(
        completed = summary.completed,
        games = summary.games_processed,
        aborted = summary.episodes_aborted,
        train_steps = summary.train_steps,
        skipped_batches = summary.skipped_batches,
        actor_crashes = summary.actor_crashes,
        games_per_second = summary.games_per_second(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfplay_rl::ConfigError;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from(["selfplay", "--num-actors", "3", "--seed", "9"]).unwrap();
        let config = args.run_config().unwrap();
        assert_eq!(config.num_actors, 3);
        assert_eq!(config.master_seed, Some(9));
    }

    #[test]
    fn test_zero_actors_is_a_config_error() {
        let args = Args::try_parse_from(["selfplay", "--num-actors", "0"]).unwrap();
        let config = args.run_config().unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
