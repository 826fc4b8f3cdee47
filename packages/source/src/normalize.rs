//! Maps raw API entries onto the canonical [`PopulationRecord`] schema.
//!
//! This is the only place that knows the remote table's field names
//! (via [`RawApiRecord`]). Entries with the all-ages aggregate label are
//! dropped here so they never reach the age bucketer.

use population_source_models::{
    AGGREGATE_AGE_LABEL, AgeLabelError, InvalidYearMonthError, PopulationRecord, RawApiRecord,
    RegionCode, YearMonth,
};
use serde::Deserialize as _;

/// Why a single entry could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The entry does not have the expected fields.
    #[error("schema drift: {0}")]
    SchemaDrift(String),

    /// The period field is not a `YYYYMM`-prefixed string.
    #[error("bad period: {0}")]
    Period(#[from] InvalidYearMonthError),

    /// The population count is not a finite number.
    #[error("non-numeric population count {0:?}")]
    Population(String),

    /// The age label cannot be bucketed.
    #[error("bad age label: {0}")]
    AgeLabel(#[from] AgeLabelError),
}

/// Normalizes one typed entry.
///
/// Returns `Ok(None)` for the all-ages aggregate row.
///
/// # Errors
///
/// Returns [`RecordError`] if the period or population count cannot be
/// parsed.
pub fn normalize_record(
    region: &RegionCode,
    raw: RawApiRecord,
) -> Result<Option<PopulationRecord>, RecordError> {
    if raw.age_label == AGGREGATE_AGE_LABEL {
        return Ok(None);
    }

    let period = YearMonth::from_period_prefix(raw.period.trim())?;
    let population = raw
        .count
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| RecordError::Population(raw.count.clone()))?;

    Ok(Some(PopulationRecord {
        period,
        region_code: region.clone(),
        region_name: raw.region_name,
        age_label: raw.age_label,
        item_label: raw.item_label,
        population,
    }))
}

/// Normalizes one loosely typed entry.
///
/// # Errors
///
/// Returns [`RecordError::SchemaDrift`] if the entry is missing fields or
/// has fields of the wrong type, or any error from [`normalize_record`].
pub fn normalize_entry(
    region: &RegionCode,
    entry: &serde_json::Value,
) -> Result<Option<PopulationRecord>, RecordError> {
    let raw =
        RawApiRecord::deserialize(entry).map_err(|e| RecordError::SchemaDrift(e.to_string()))?;
    normalize_record(region, raw)
}
