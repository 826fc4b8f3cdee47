#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset assembly, horizon-keyed caching, and per-region aggregation.
//!
//! [`DatasetCache`] is the entry point: it asks [`HorizonDiscovery`] for
//! the current horizon, fans requests out over every (region, window)
//! pair via [`build::build_dataset`], and hands complete [`Dataset`]s to
//! the presentation contract in [`presentation`].
//!
//! [`Dataset`]: population_dataset_models::Dataset
//! [`HorizonDiscovery`]: population_source::horizon::HorizonDiscovery

pub mod aggregate;
pub mod build;
pub mod cache;
pub mod presentation;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use population_source::SourceError;
use population_source::config::SourceConfig;
use population_source::horizon::HorizonDiscovery;
use population_source::kosis::KosisClient;
use population_source_models::InvalidWindowStartError;

pub use cache::DatasetCache;

/// Errors that prevent a Dataset from being published.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A remote source could not be configured.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The window planner produced an invalid window.
    #[error("invalid request window: {0}")]
    Window(#[from] InvalidWindowStartError),

    /// Every request failed; publishing would replace data with nothing.
    #[error("all {requested} requests failed; dataset not published")]
    NoCoverage {
        /// Number of requests issued.
        requested: usize,
    },
}

/// Builds a [`DatasetCache`] backed by the live statistics API and, when
/// configured, HTTP horizon discovery.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if no API key is configured or the
/// HTTP client cannot be built.
pub fn cache_from_config(config: &SourceConfig) -> Result<DatasetCache, SourceError> {
    let client = reqwest::Client::builder()
        .user_agent("population-trend/1.0")
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let api = KosisClient::new(client.clone(), &config.table, config.require_api_key()?);
    let discovery = HorizonDiscovery::from_url(client, config.horizon_url.as_deref());

    Ok(DatasetCache::new(
        Arc::new(api),
        discovery,
        config.table.clone(),
        config.concurrency,
    ))
}
