//! Init-db command - create staging tables, the reject table and views.

use std::path::Path;

use colored::Colorize;
use stageline::Stageline;
use stageline::persistence::{REJECT_TABLE, reject_view_name};

use crate::cli::StoreArgs;

pub fn run(
    config_path: &Path,
    source: Option<String>,
    store: StoreArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path, &store)?;
    let sources = super::select_sources(&config, source.as_deref())?;
    let stageline = Stageline::new(config.defaults.clone());

    println!(
        "{} {}",
        "Preparing".cyan().bold(),
        config.defaults.db_url.white()
    );

    for source in sources {
        stageline.init_db(source)?;
        let table = source.table_schema();
        println!(
            "  {} {}, {}, {}",
            "ready".green(),
            table.name,
            REJECT_TABLE,
            reject_view_name(&table)
        );
    }

    println!("{}", "Done.".green().bold());
    Ok(())
}
