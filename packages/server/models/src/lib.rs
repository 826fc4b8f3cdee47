#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! JSON response types for the population trend API.
//!
//! Kept separate from the dataset types so the API contract can evolve
//! independently of the pipeline's internal representation.

use chrono::{DateTime, Utc};
use population_dataset_models::{AggregatedSeries, CoverageReport, Dataset};
use population_source_models::YearMonth;
use serde::{Deserialize, Serialize};

/// `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

/// One configured region and whether the current dataset has data for
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRegion {
    /// Code sent to the statistics API.
    pub code: String,
    /// Configured label.
    pub label: String,
    /// Name the API reports for the region, if any records came back.
    pub name: Option<String>,
}

/// Dataset metadata attached to every data response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDatasetInfo {
    pub horizon: YearMonth,
    pub built_at: DateTime<Utc>,
    pub record_count: usize,
    /// Whether some requests failed or some records were dropped.
    pub partial: bool,
}

impl From<&Dataset> for ApiDatasetInfo {
    fn from(dataset: &Dataset) -> Self {
        Self {
            horizon: dataset.horizon,
            built_at: dataset.built_at,
            record_count: dataset.records.len(),
            partial: dataset.is_partial(),
        }
    }
}

/// `GET /api/regions`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRegions {
    pub dataset: ApiDatasetInfo,
    /// Distinct region names present in the dataset.
    pub available: Vec<String>,
    /// Item labels present in the dataset, valid as `?item=` on the
    /// series endpoint.
    pub items: Vec<String>,
    /// Every configured region.
    pub configured: Vec<ApiRegion>,
}

/// `GET /api/series/{region}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSeries {
    pub dataset: ApiDatasetInfo,
    /// Item label the series is restricted to, if any.
    pub item: Option<String>,
    #[serde(flatten)]
    pub series: AggregatedSeries,
}

/// Query parameters for the series endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQueryParams {
    /// Restrict the series to one item label.
    pub item: Option<String>,
}

/// `GET /api/coverage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCoverage {
    pub dataset: ApiDatasetInfo,
    pub horizon_version: u64,
    pub succeeded: usize,
    #[serde(flatten)]
    pub coverage: CoverageReport,
}

impl From<&Dataset> for ApiCoverage {
    fn from(dataset: &Dataset) -> Self {
        Self {
            dataset: dataset.into(),
            horizon_version: dataset.horizon_version,
            succeeded: dataset.coverage.succeeded(),
            coverage: dataset.coverage.clone(),
        }
    }
}

/// `POST /api/horizon/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHorizonRefresh {
    /// Whether the discovered horizon differs from the previous one.
    pub changed: bool,
    /// Whether discovery produced a value at all.
    pub discovered: bool,
    /// Horizon the next dataset build plans against.
    pub effective_horizon: YearMonth,
    pub version: u64,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
