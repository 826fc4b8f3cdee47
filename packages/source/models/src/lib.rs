#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Period, region, raw payload, and normalized record types for the
//! population statistics pipeline.
//!
//! The remote statistics API encodes periods as compact `YYYYMM`
//! integers. [`YearMonth`] is the typed form of that encoding and
//! [`RequestWindow`] captures the fixed-width windows the pipeline asks
//! the API for. Raw payload entries ([`RawApiRecord`]) are mapped into
//! [`PopulationRecord`]s and annotated with an [`AgeBucket`].

mod age;
mod period;

use serde::{Deserialize, Serialize};

pub use age::{AGGREGATE_AGE_LABEL, AgeBucket, AgeLabelError, OPEN_ENDED_AGE_LABEL};
pub use period::{InvalidWindowStartError, InvalidYearMonthError, RequestWindow, YearMonth};

/// An administrative region identifier understood by the statistics API
/// (e.g. `"41250"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    /// Wraps a region code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// One entry of a successful statistics API response.
///
/// Field names mirror the remote table's JSON keys. Every value arrives
/// as a string; typing happens during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawApiRecord {
    /// Period, `YYYYMM` optionally followed by more granular digits.
    #[serde(rename = "PRD_DE")]
    pub period: String,
    /// Region name (e.g. `"동두천시"`).
    #[serde(rename = "C1_NM")]
    pub region_name: String,
    /// Age label (e.g. `"23세"`, `"100세 이상"`, `"계"`).
    #[serde(rename = "C2_NM")]
    pub age_label: String,
    /// Item label distinguishing total/male/female counts.
    #[serde(rename = "ITM_NM")]
    pub item_label: String,
    /// Population count as a decimal string.
    #[serde(rename = "DT")]
    pub count: String,
}

/// A population count normalized to the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    /// Month the count refers to.
    pub period: YearMonth,
    /// Region code the record was requested with.
    pub region_code: RegionCode,
    /// Region name as reported by the API.
    pub region_name: String,
    /// Age label, verbatim.
    pub age_label: String,
    /// Item label, verbatim.
    pub item_label: String,
    /// Population count.
    pub population: f64,
}
