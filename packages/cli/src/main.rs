#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line interface for the population trend toolchain.
//!
//! Plans the request grid, runs horizon discovery, builds the dataset and
//! prints per-region cohort series. With no subcommand it drops into an
//! interactive region picker.
//!
//! Uses `indicatif-log-bridge` (via [`population_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod report;

use clap::{Parser, Subcommand};
use population_cli_utils::{IndicatifProgress, MultiProgress};
use population_dataset::presentation::{get_aggregated_series, get_aggregated_series_for_item};
use population_dataset::{DatasetCache, cache_from_config};
use population_source::config::SourceConfig;
use population_source::horizon::{HorizonCheck, HorizonDiscovery};
use population_source::window::plan_windows;
use population_source_models::YearMonth;

#[derive(Parser)]
#[command(name = "population_cli", about = "Population-by-age trend toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the (region x window) request grid
    Windows {
        /// Horizon as `YYYYMM` (defaults to the table's default horizon)
        #[arg(long)]
        horizon: Option<YearMonth>,
    },
    /// Run horizon discovery once and print the result
    Horizon,
    /// Build the dataset and print a coverage summary
    Fetch,
    /// List configured regions
    Regions {
        /// Also build the dataset and show the name the API reports for
        /// each region
        #[arg(long)]
        available: bool,
    },
    /// Print cohort and total series for one region
    Series {
        /// Region code, configured label, or reported name
        region: String,
        /// Restrict to one item label (e.g. a single sex)
        #[arg(long)]
        item: Option<String>,
    },
    /// Start the HTTP API server
    Serve {
        /// Prompt for bind address, port and horizon check interval
        #[arg(long)]
        interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = population_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = SourceConfig::from_env()?;

    let Some(command) = cli.command else {
        return interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Windows { horizon } => {
            let horizon = horizon.unwrap_or(config.table.default_horizon);
            let windows = plan_windows(&config.table, horizon)?;
            print!("{}", report::format_windows(&config.table, horizon, &windows));
        }
        Commands::Horizon => {
            let Some(url) = config.horizon_url.as_deref() else {
                println!(
                    "Horizon discovery not configured; using default {}",
                    config.table.default_horizon
                );
                return Ok(());
            };
            let discovery = HorizonDiscovery::from_url(reqwest::Client::new(), Some(url));
            match discovery.check().await {
                HorizonCheck::Changed { current, .. } => println!("Horizon: {current}"),
                HorizonCheck::Unchanged { horizon, .. } => println!("Horizon: {horizon}"),
                HorizonCheck::Unknown => println!(
                    "Could not discover horizon from {url}; using default {}",
                    config.table.default_horizon
                ),
            }
        }
        Commands::Fetch => {
            let cache = build_cache(&config, &multi)?;
            let dataset = cache.dataset().await?;
            print!("{}", report::format_coverage(&dataset));
        }
        Commands::Regions { available } => {
            let dataset = if available {
                Some(build_cache(&config, &multi)?.dataset().await?)
            } else {
                None
            };
            print!("{}", report::format_regions(&config.table, dataset.as_deref()));
        }
        Commands::Series { region, item } => {
            let cache = build_cache(&config, &multi)?;
            let code = config
                .table
                .find_region(&region)
                .map_or(region.as_str(), |r| r.code.as_str());
            let mut series = match item.as_deref() {
                Some(item) => get_aggregated_series_for_item(&cache, code, item).await?,
                None => get_aggregated_series(&cache, code).await?,
            };
            series.region.clone_from(&region);
            print!("{}", report::format_series(&series));
            if cache.dataset().await?.is_partial() {
                log::warn!("Dataset is partial; run `fetch` for the coverage report");
            }
        }
        Commands::Serve { interactive } => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                let system = actix_web::rt::System::new();
                if interactive {
                    system.block_on(population_server::interactive::run())
                } else {
                    system.block_on(population_server::run_server())
                }
            })
            .await??;
        }
    }

    Ok(())
}

/// Builds a live dataset cache that reports progress to `multi`.
fn build_cache(
    config: &SourceConfig,
    multi: &MultiProgress,
) -> Result<DatasetCache, Box<dyn std::error::Error>> {
    Ok(cache_from_config(config)?.with_progress(IndicatifProgress::requests_bar(
        multi,
        &format!("Fetching {}", config.table.table_id),
    )))
}
