//! Validate command - classify records without loading them.

use std::path::{Path, PathBuf};

use colored::Colorize;
use stageline::Stageline;

use crate::cli::StoreArgs;

pub fn run(
    config_path: &Path,
    source: Option<String>,
    file: Option<PathBuf>,
    json_output: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path, &StoreArgs::default())?;
    let mut sources: Vec<_> = super::select_sources(&config, source.as_deref())?
        .into_iter()
        .cloned()
        .collect();

    if let Some(file) = file {
        if sources.len() != 1 {
            return Err("FILE requires a single source (use --source)".into());
        }
        if !file.exists() {
            return Err(format!("File not found: {}", file.display()).into());
        }
        sources[0].path = file;
    }

    let stageline = Stageline::new(config.defaults.clone());

    let mut summaries = Vec::with_capacity(sources.len());
    for source in &sources {
        if !json_output {
            println!(
                "{} {} ({})",
                "Validating".cyan().bold(),
                source.name.white().bold(),
                source.path.display()
            );
        }
        let summary = stageline.validate(source)?;
        if !json_output {
            super::print_summary(&summary, verbose);
            println!();
        }
        summaries.push(summary);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }
    Ok(())
}
