//! Stageline CLI - validate and stage tabular data.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            source,
            store,
            batch_size,
            fail_fast,
            json,
        } => commands::run::run(
            &cli.config,
            source,
            store,
            batch_size,
            fail_fast,
            json,
            cli.verbose,
        ),

        Commands::Validate { source, file, json } => {
            commands::validate::run(&cli.config, source, file, json, cli.verbose)
        }

        Commands::InitDb { source, store } => commands::init_db::run(&cli.config, source, store),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` wins; otherwise `--verbose` selects debug.
fn init_tracing(verbose: bool) {
    let default = if verbose { "stageline=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
