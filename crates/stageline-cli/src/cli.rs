//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stageline::config::DEFAULT_CONFIG_PATH;

/// Stageline: validate tabular records and load them into staging tables
#[derive(Parser)]
#[command(name = "stageline")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Overrides for the configuration defaults.
#[derive(clap::Args, Debug, Default)]
pub struct StoreArgs {
    /// Database path or sqlite:// URL (overrides db_url)
    #[arg(long, value_name = "URL")]
    pub db: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, validate and load sources into the staging store
    Run {
        /// Only run this source (default: every configured source)
        #[arg(short, long)]
        source: Option<String>,

        #[command(flatten)]
        store: StoreArgs,

        /// Records per batch transaction (overrides batch_size)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Stop loading a source at its first failed batch
        #[arg(long)]
        fail_fast: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read and validate sources without writing to the store
    Validate {
        /// Only validate this source
        #[arg(short, long)]
        source: Option<String>,

        /// Validate this file with the source's rules instead of its configured path
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the staging and reject tables if they do not exist
    InitDb {
        /// Only prepare this source's table
        #[arg(short, long)]
        source: Option<String>,

        #[command(flatten)]
        store: StoreArgs,
    },
}
