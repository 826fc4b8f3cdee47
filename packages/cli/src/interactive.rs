//! Interactive region browser.
//!
//! Builds the dataset once, then lets the user pick regions from the
//! ones present and prints their series until they stop.

use dialoguer::{Confirm, Select};
use population_cli_utils::MultiProgress;
use population_dataset::presentation::{get_aggregated_series, list_available_regions};
use population_source::config::SourceConfig;

use crate::report;

/// Runs the region picker loop.
///
/// # Errors
///
/// Returns an error if the dataset cannot be built or a prompt fails.
pub async fn run(
    config: &SourceConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Population Trend: {}", config.table.name);
    println!();

    let cache = crate::build_cache(config, multi)?;
    let regions = list_available_regions(&cache).await?;

    if regions.is_empty() {
        println!("No region returned data for horizon {}.", cache.effective_horizon());
        return Ok(());
    }
    if cache.dataset().await?.is_partial() {
        println!("Note: some requests failed; figures may be incomplete.");
    }

    let mut default = 0;
    loop {
        let idx = Select::new()
            .with_prompt("Select a region")
            .items(&regions)
            .default(default)
            .interact()?;
        default = idx;

        let series = get_aggregated_series(&cache, &regions[idx]).await?;
        println!();
        print!("{}", report::format_series(&series));
        println!();

        if !Confirm::new()
            .with_prompt("Show another region?")
            .default(true)
            .interact()?
        {
            break;
        }
    }

    Ok(())
}
