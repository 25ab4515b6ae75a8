//! Disorder CLI - batch entropy measurements for large image collections.
//!
//! Disorder scores every image under a directory with a battery of entropy
//! methods and appends the results to `entropy_results.json` in a destination
//! directory. Interrupted runs resume where they stopped.
//!
//! # Usage
//!
//! ```bash
//! # Score a directory with the configured methods
//! disorder process ./images -o ./results
//!
//! # Pick methods and a partition depth
//! disorder process ./images --method hist,dft,lbp --depth 2
//!
//! # Build a normalization table once and reuse it
//! disorder calibrate -o reference.json
//! disorder process ./images --normalization reference.json
//!
//! # View configuration
//! disorder config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Disorder - batch entropy measurements for large image collections.
#[derive(Parser, Debug)]
#[command(name = "disorder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "DISORDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Score images and append their entropy results to the destination
    Process(cli::process::ProcessArgs),

    /// Compute a normalization table from a seeded noise image
    Calibrate(cli::calibrate::CalibrateArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config errors go straight to stderr.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `disorder config path`."
            );
            disorder_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Disorder v{}", disorder_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Calibrate(args) => cli::calibrate::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}
