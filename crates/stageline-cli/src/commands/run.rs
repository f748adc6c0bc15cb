//! Run command - read, validate and load sources.

use std::path::Path;

use colored::Colorize;
use stageline::{OnBatchError, Stageline};

use crate::cli::StoreArgs;

pub fn run(
    config_path: &Path,
    source: Option<String>,
    store: StoreArgs,
    batch_size: Option<usize>,
    fail_fast: bool,
    json_output: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path, &store)?;
    if let Some(size) = batch_size {
        config.defaults.batch_size = size;
    }
    if fail_fast {
        config.defaults.on_batch_error = OnBatchError::Abort;
    }
    config.validate()?;

    let sources = super::select_sources(&config, source.as_deref())?;
    let stageline = Stageline::new(config.defaults.clone());

    let mut summaries = Vec::with_capacity(sources.len());
    let mut failed = Vec::new();
    for source in sources {
        if !json_output {
            println!(
                "{} {} {} {}",
                "Loading".cyan().bold(),
                source.name.white().bold(),
                "->".dimmed(),
                config.defaults.db_url
            );
        }

        // Sources are independent: report a failed one and move on.
        let summary = match stageline.run(source) {
            Ok(summary) => summary,
            Err(e) => {
                eprintln!("  {} {}: {}", "Failed".red().bold(), source.name, e);
                failed.push(source.name.clone());
                continue;
            }
        };
        if !json_output {
            super::print_summary(&summary, verbose);
            println!();
        }
        summaries.push(summary);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    if !failed.is_empty() {
        return Err(format!("source(s) failed: {}", failed.join(", ")).into());
    }
    let incomplete = summaries.iter().filter(|s| !s.is_complete()).count();
    if incomplete > 0 {
        return Err(format!("{} source(s) had failed batches", incomplete).into());
    }

    if !json_output {
        println!("{}", "Done.".green().bold());
    }
    Ok(())
}
