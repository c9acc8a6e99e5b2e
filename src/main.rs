//! Race Recommender - scores and ranks racing opportunities
//!
//! Offline front end: reads JSON exports of opportunities, user history and
//! global statistics, and prints scores as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use race_recommender::cli::commands;
use race_recommender::config::Config;
use race_recommender::scoring::Mode;

/// Race Recommender - opportunity scoring and ranking
#[derive(Parser)]
#[command(name = "race-recommender")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single opportunity
    Score {
        /// Opportunity JSON file
        #[arg(long)]
        opportunity: PathBuf,

        /// User history JSON file
        #[arg(long)]
        history: PathBuf,

        /// Scoring mode: irating_push, safety_recovery, balanced
        #[arg(long)]
        mode: Option<Mode>,
    },

    /// Score and rank a list of opportunities
    Rank {
        /// JSON array of opportunities
        #[arg(long)]
        opportunities: PathBuf,

        /// User history JSON file
        #[arg(long)]
        history: PathBuf,

        /// JSON array of global stats records (default: stats embedded in opportunities)
        #[arg(long)]
        global_stats: Option<PathBuf>,

        /// Scoring mode: irating_push, safety_recovery, balanced
        #[arg(long)]
        mode: Option<Mode>,

        /// Number of results to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the factor weights for every mode
    Weights,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing; logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("race_recommender=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Score {
            opportunity,
            history,
            mode,
        } => commands::score(&config, &opportunity, &history, mode),
        Commands::Rank {
            opportunities,
            history,
            global_stats,
            mode,
            limit,
        } => {
            commands::rank(
                &config,
                &opportunities,
                &history,
                global_stats.as_deref(),
                mode,
                limit,
            )
            .await
        }
        Commands::Weights => commands::show_weights(&config),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
