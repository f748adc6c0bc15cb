//! CLI command implementations.

pub mod init_db;
pub mod run;
pub mod validate;

use std::path::Path;

use colored::Colorize;
use stageline::{Config, RunSummary, SourceConfig};

use crate::cli::StoreArgs;

/// Load the configuration and apply store overrides.
pub(crate) fn load_config(
    path: &Path,
    store: &StoreArgs,
) -> Result<Config, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }
    let mut config = Config::load(path)?;
    if let Some(db) = &store.db {
        config.defaults.db_url = db.clone();
    }
    config.validate()?;
    Ok(config)
}

/// The named source, or every configured source.
pub(crate) fn select_sources<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<Vec<&'a SourceConfig>, Box<dyn std::error::Error>> {
    match name {
        Some(name) => Ok(vec![config.source(name)?]),
        None => Ok(config.sources.iter().collect()),
    }
}

/// Human-readable run summary.
pub(crate) fn print_summary(summary: &RunSummary, verbose: bool) {
    println!(
        "  {} {} records ({}, sha256 {})",
        "Read".cyan(),
        summary.input.to_string().white().bold(),
        summary.file.file,
        short_hash(&summary.file.hash)
    );
    if verbose {
        println!(
            "  {} {} placeholders nulled, {} unparseable dates",
            "Cleaned".cyan(),
            summary.cleaning.placeholders_nulled,
            summary.cleaning.invalid_dates
        );
    }
    println!(
        "  {} {} accepted, {} rejected ({:.1}% accepted)",
        "Validated".cyan(),
        summary.accepted.to_string().green().bold(),
        summary.rejected.to_string().red().bold(),
        summary.success_rate()
    );

    if !summary.reasons.is_empty() {
        println!("  {}", "Rejections by reason:".yellow());
        let limit = if verbose { summary.reasons.len() } else { 5 };
        for (reason, count) in summary.reasons.iter().take(limit) {
            println!("    {:>7}  {}", count, reason);
        }
        if summary.reasons.len() > limit {
            println!("    ... {} more (use --verbose)", summary.reasons.len() - limit);
        }
    }

    if let Some(persisted) = &summary.persistence {
        println!(
            "  {} {} inserted, {} updated, {} rejects appended ({} batches committed)",
            "Loaded".cyan(),
            persisted.inserted.to_string().green(),
            persisted.updated.to_string().green(),
            persisted.appended.to_string().yellow(),
            persisted.batches_committed
        );
        for failure in &persisted.failures {
            println!(
                "  {} {} batch {} ({} rows) at key {}: {}",
                "Rolled back".red().bold(),
                failure.table,
                failure.batch_index,
                failure.rows,
                failure.key,
                failure.error
            );
        }
        if persisted.aborted {
            println!("  {}", "Load aborted after the first failed batch".red());
        }
    }
}

fn short_hash(hash: &str) -> &str {
    let digest = hash.strip_prefix("sha256:").unwrap_or(hash);
    digest.get(..12).unwrap_or(digest)
}
