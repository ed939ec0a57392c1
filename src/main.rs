//! Trueno-DOE CLI.
//!
//! Commands:
//! - run: sample a fresh design and run the whole batch
//! - resume: continue a batch from its `sweep.json` ledger

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trueno_doe::config::SweepConfig;
use trueno_doe::{Sweep, SweepOutcome};

#[derive(Parser)]
#[command(name = "trueno-doe")]
#[command(version)]
#[command(about = "Latin Hypercube sweeps over external simulation runs")]
struct Cli {
    /// Enable verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample, run and assemble a new batch
    Run {
        /// Settings file (YAML)
        settings: PathBuf,

        /// Random seed, overriding the settings file
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Continue an interrupted batch
    Resume {
        /// Settings file (YAML) of the original batch
        settings: PathBuf,

        /// Re-attempt runs that failed previously
        #[arg(long)]
        retry_failed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let outcome = match cli.command {
        Commands::Run { settings, seed } => {
            let config = load_config(&settings)?;
            let mut sweep = Sweep::new(config);
            if let Some(seed) = seed {
                sweep = sweep.with_seed(seed);
            }
            sweep.run().context("sweep failed")?
        }
        Commands::Resume {
            settings,
            retry_failed,
        } => {
            let config = load_config(&settings)?;
            Sweep::new(config)
                .retry_failed(retry_failed)
                .resume()
                .context("resume failed")?
        }
    };

    report(&outcome);
    Ok(())
}

fn load_config(path: &Path) -> Result<SweepConfig> {
    SweepConfig::load(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))
}

fn report(outcome: &SweepOutcome) {
    info!(
        seed = outcome.seed,
        runs = outcome.runs.len(),
        failed = outcome.failed_count(),
        "done"
    );
    println!(
        "{} runs ({} failed), seed {}",
        outcome.dataset.len(),
        outcome.failed_count(),
        outcome.seed
    );
}
