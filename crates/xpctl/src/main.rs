//! CookingXP Control - CLI for recipe progression
//!
//! Drives the progression engine against the local preference file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xpctl")]
#[command(about = "CookingXP - unlock recipes by completing achievements", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/cookingxp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show score and every tree with node states
    Status,

    /// Record a completed achievement
    Complete {
        /// Achievement id
        id: u16,
    },

    /// Clear all progress
    Reset,

    /// Show or override the score
    Score {
        /// New score value
        #[arg(long)]
        set: Option<i64>,
    },

    /// Print the persisted form as JSON
    Export,

    /// Re-run validation and list anything released
    Validate,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = commands::open_engine(cli.config.as_deref())?;

    match cli.command {
        Commands::Status => commands::status(&engine),
        Commands::Complete { id } => commands::complete(&engine, id),
        Commands::Reset => commands::reset(&engine),
        Commands::Score { set } => commands::score(&engine, set),
        Commands::Export => commands::export(&engine),
        Commands::Validate => commands::validate(&engine),
    }
}
