//! PGAS Simulation Binary
//!
//! Runs a group of ranks over the loopback fabric inside one process and
//! either finalizes them all or lets one rank trigger global exit.

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use parking_lot::Mutex;
use pgas_comms::config::{ConfigLoader, GlobalExitConfig};
use pgas_comms::context::ContextRegistry;
use pgas_comms::global_exit::{ExitHandler, GlobalExit, MonitorOutcome, ProcessExit};
use pgas_comms::logging::init_logging;
use pgas_comms::transport::LoopbackFabric;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Simulate global exit across an in-process group of ranks
#[derive(Parser, Debug)]
#[command(name = "pgas-sim")]
#[command(about = "Simulate context setup and global exit over a loopback fabric")]
struct Cli {
    /// Number of simulated ranks
    #[arg(long, default_value = "4")]
    ranks: usize,

    /// Rank that triggers global exit (finalize all ranks if absent)
    #[arg(long)]
    trigger: Option<usize>,

    /// Exit status passed to the trigger
    #[arg(long, default_value = "1")]
    status: i32,

    /// Ship the trigger's status to every rank
    #[arg(long)]
    propagate_status: bool,

    /// Let the triggering rank end this process instead of reporting
    #[arg(long)]
    exit_process: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Records the status a monitor would have exited with.
#[derive(Debug, Default)]
struct RecordedExit {
    status: Mutex<Option<i32>>,
}

impl ExitHandler for RecordedExit {
    fn exit(&self, status: i32) {
        *self.status.lock() = Some(status);
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let exit_config = GlobalExitConfig {
        propagate_status: cli.propagate_status || config.global_exit.propagate_status,
        ..config.global_exit
    };

    match run(&cli, exit_config) {
        Ok(outcomes) => {
            for (rank, outcome) in outcomes.iter().enumerate() {
                match outcome {
                    MonitorOutcome::Done => println!("rank {}: done", rank),
                    MonitorOutcome::Zapped(status) => {
                        println!("rank {}: zapped status={}", rank, status)
                    }
                }
            }
        }
        Err(e) => {
            error!("Simulation failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli, exit_config: GlobalExitConfig) -> Result<Vec<MonitorOutcome>> {
    if cli.ranks == 0 {
        bail!("--ranks must be at least 1");
    }
    if let Some(trigger) = cli.trigger {
        if trigger >= cli.ranks {
            bail!("--trigger {} out of range for {} ranks", trigger, cli.ranks);
        }
    }

    let fabric = LoopbackFabric::new(cli.ranks);
    let mut ranks = Vec::with_capacity(cli.ranks);
    for rank in 0..cli.ranks {
        let transport = Arc::new(fabric.endpoint(rank)?);
        let registry = ContextRegistry::new(transport);
        registry
            .create_default()
            .with_context(|| format!("default context on rank {}", rank))?;

        let handler: Arc<dyn ExitHandler> = if cli.exit_process && cli.trigger == Some(rank) {
            Arc::new(ProcessExit)
        } else {
            Arc::new(RecordedExit::default())
        };
        let exit = GlobalExit::new(&registry, exit_config.clone())
            .with_context(|| format!("global exit on rank {}", rank))?
            .with_exit_handler(handler);
        exit.init()?;
        ranks.push((registry, exit));
    }
    info!(ranks = cli.ranks, "Simulated group initialized");

    thread::scope(|scope| {
        let handles: Vec<_> = ranks
            .iter()
            .enumerate()
            .map(|(rank, (_registry, exit))| {
                scope.spawn(move || match cli.trigger {
                    Some(trigger) if trigger == rank => exit.trigger(cli.status),
                    Some(_) => exit.join(),
                    None => exit.finalize(),
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => bail!("rank thread panicked"),
            })
            .collect()
    })
}
