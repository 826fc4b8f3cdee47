//! The contract a UI or chart layer consumes.
//!
//! Both calls go through the cache, so after a horizon change they
//! return data from the new Dataset only. Callers should re-query after
//! [`DatasetCache::refresh_horizon`] reports a change.

use population_dataset_models::AggregatedSeries;

use crate::aggregate::{aggregate_region, aggregate_region_item};
use crate::{DatasetCache, DatasetError};

/// Cohort and total series for `region` (code or name), summed across
/// all items.
///
/// # Errors
///
/// Returns [`DatasetError`] if no Dataset could be built.
pub async fn get_aggregated_series(
    cache: &DatasetCache,
    region: &str,
) -> Result<AggregatedSeries, DatasetError> {
    let dataset = cache.dataset().await?;
    Ok(aggregate_region(&dataset, region))
}

/// Cohort and total series for `region`, restricted to one item label.
///
/// # Errors
///
/// Returns [`DatasetError`] if no Dataset could be built.
pub async fn get_aggregated_series_for_item(
    cache: &DatasetCache,
    region: &str,
    item: &str,
) -> Result<AggregatedSeries, DatasetError> {
    let dataset = cache.dataset().await?;
    Ok(aggregate_region_item(&dataset, region, item))
}

/// Distinct region names present in the Dataset, in first-appearance
/// order.
///
/// # Errors
///
/// Returns [`DatasetError`] if no Dataset could be built.
pub async fn list_available_regions(cache: &DatasetCache) -> Result<Vec<String>, DatasetError> {
    Ok(cache.dataset().await?.region_names())
}
