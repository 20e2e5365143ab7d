//! coflow - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coflow::util::config;
use coflow::util::logger::{self, LogLevel};
use coflow::{run_demo, run_parallel, NAME, VERSION};
use serde::Serialize;
use std::path::PathBuf;

/// Cooperative task scheduler demo driver
#[derive(Parser, Debug)]
#[command(name = "coflow")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $COFLOW_CONFIG)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tick a steppable runner until its tasks drain
    Demo {
        /// standard, serial, staggered:N, time-bound:MS or time-sliced:MS
        #[arg(short, long)]
        flow: Option<String>,

        /// Number of root tasks
        #[arg(short, long, default_value_t = 8)]
        tasks: usize,

        /// Steps each task takes
        #[arg(short, long, default_value_t = 3)]
        steps: usize,
    },

    /// Sum a range with a data-parallel job over a runner pool
    Parallel {
        /// Number of iterations
        #[arg(short, long, default_value_t = 1_000_000)]
        iterations: usize,

        /// Pool size (defaults to config, then available parallelism)
        #[arg(short, long)]
        runners: Option<usize>,
    },

    /// Print the effective configuration
    Config,

    /// Print version information
    Version,
}

fn emit<T: Serialize + std::fmt::Debug>(
    json: bool,
    value: &T,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{:#?}", value);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level()?
    };
    logger::init_with_level(level);

    match args.command {
        Commands::Demo { flow, tasks, steps } => {
            let flow = flow.unwrap_or_else(|| config.runner.flow.clone());
            let report = run_demo(&flow, tasks, steps)?;
            emit(args.json, &report)?;
        }
        Commands::Parallel {
            iterations,
            runners,
        } => {
            if runners.is_some() {
                config.pool.size = runners;
            }
            config.validate()?;
            let report = run_parallel(&config, iterations).context("Parallel run failed")?;
            emit(args.json, &report)?;
        }
        Commands::Config => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", config.to_toml_string()?);
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
