#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset, coverage report, and aggregated series types.
//!
//! A [`Dataset`] is the complete set of bucketed records for one horizon.
//! It is built wholesale and never patched; the [`CoverageReport`] that
//! travels with it says which requests failed or came back empty and
//! which entries were dropped, so consumers can tell a partial dataset
//! from a complete one.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use population_source_models::{AgeBucket, PopulationRecord, RegionCode, RequestWindow, YearMonth};
use serde::{Deserialize, Serialize};

/// A normalized record annotated with its age cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRecord {
    #[serde(flatten)]
    pub record: PopulationRecord,
    pub age_bucket: AgeBucket,
}

impl CohortRecord {
    /// Whether this record belongs to `region`, given as either a region
    /// code or a region name.
    #[must_use]
    pub fn is_in_region(&self, region: &str) -> bool {
        self.record.region_code.as_str() == region || self.record.region_name == region
    }
}

/// A request that failed after retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWindow {
    pub region: RegionCode,
    pub window: RequestWindow,
    pub error: String,
}

/// A request the API answered with "no data".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyWindow {
    pub region: RegionCode,
    pub window: RequestWindow,
    pub reason: String,
}

/// A payload entry dropped during normalization or bucketing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub region: RegionCode,
    pub window: RequestWindow,
    /// Position of the entry within its payload.
    pub index: usize,
    pub error: String,
}

/// What the build asked for and what it did not get.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    /// Number of (region, window) requests issued.
    pub requested: usize,
    pub failed_windows: Vec<FailedWindow>,
    pub empty_windows: Vec<EmptyWindow>,
    pub rejected_records: Vec<RejectedRecord>,
}

impl CoverageReport {
    /// Whether any request failed or any entry was dropped.
    ///
    /// Empty windows do not count: the API legitimately has nothing for
    /// periods past the data horizon.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_windows.is_empty() || !self.rejected_records.is_empty()
    }

    /// Number of requests that produced records.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.requested
            .saturating_sub(self.failed_windows.len())
            .saturating_sub(self.empty_windows.len())
    }
}

/// Every bucketed record for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Horizon the request grid was planned against.
    pub horizon: YearMonth,
    /// Horizon tracker version observed when the build started.
    pub horizon_version: u64,
    pub built_at: DateTime<Utc>,
    pub records: Vec<CohortRecord>,
    pub coverage: CoverageReport,
}

impl Dataset {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.coverage.is_partial()
    }

    /// Distinct region names in order of first appearance.
    #[must_use]
    pub fn region_names(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.record.region_name.as_str()))
    }

    /// Records for `region`, given as a region code or name.
    pub fn records_in_region<'a>(
        &'a self,
        region: &'a str,
    ) -> impl Iterator<Item = &'a CohortRecord> + 'a {
        self.records.iter().filter(move |r| r.is_in_region(region))
    }

    /// Distinct item labels in order of first appearance.
    #[must_use]
    pub fn item_labels(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.record.item_label.as_str()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value) {
            out.push(value.to_string());
        }
    }
    out
}

/// Per-region time series derived from a [`Dataset`].
///
/// Both maps are keyed by period and iterate in ascending period order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSeries {
    /// The region as requested (code or name).
    pub region: String,
    /// Population per cohort per period.
    pub cohort_series: BTreeMap<YearMonth, BTreeMap<AgeBucket, f64>>,
    /// Population per period across all cohorts.
    pub total_series: BTreeMap<YearMonth, f64>,
}

impl AggregatedSeries {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_series.is_empty()
    }

    /// Periods present, ascending.
    pub fn periods(&self) -> impl Iterator<Item = YearMonth> + '_ {
        self.total_series.keys().copied()
    }
}
