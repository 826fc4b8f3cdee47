//! Statistics table definition, embedded at compile time.
//!
//! The pipeline serves exactly one table. Its identifiers, item codes,
//! sampling parameters and region set live in
//! `packages/source/tables/dt_1b04006.toml` so a schema or region change
//! is a config edit rather than a code change.

use population_source_models::{RegionCode, YearMonth};
use serde::Deserialize;

use crate::SourceError;

/// TOML config embedded at compile time.
const POPULATION_TABLE_TOML: &str = include_str!("../tables/dt_1b04006.toml");

/// A fixed statistics table and the grid of requests made against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableDefinition {
    /// Short identifier (e.g. `"dt_1b04006"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Endpoint for parameterized data queries.
    pub api_url: String,
    /// Publishing organization id (`orgId`).
    pub org_id: String,
    /// Table id (`tblId`).
    pub table_id: String,
    /// Item codes requested together (`itmId`).
    pub item_ids: Vec<String>,
    /// Year of the first sample period.
    pub start_year: u16,
    /// Years between consecutive sample periods.
    pub stride_years: u16,
    /// Added to a January `YYYYMM` to obtain the window end.
    pub window_increment: u32,
    /// Horizon used until discovery succeeds.
    pub default_horizon: YearMonth,
    /// Document publishing the current horizon, if any.
    #[serde(default)]
    pub horizon_url: Option<String>,
    /// Regions requested, in display order.
    pub regions: Vec<RegionDefinition>,
}

/// One requested region.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionDefinition {
    /// Code sent as `objL1`.
    pub code: RegionCode,
    /// Human-readable label.
    pub label: String,
}

impl TableDefinition {
    /// Region codes in configured order.
    #[must_use]
    pub fn region_codes(&self) -> Vec<RegionCode> {
        self.regions.iter().map(|r| r.code.clone()).collect()
    }

    /// Finds a configured region by code or by label (ASCII
    /// case-insensitive).
    #[must_use]
    pub fn find_region(&self, input: &str) -> Option<&RegionDefinition> {
        let input = input.trim();
        self.regions
            .iter()
            .find(|r| r.code.as_str() == input || r.label.eq_ignore_ascii_case(input))
    }

    fn validate(self) -> Result<Self, SourceError> {
        let invalid = |message: &str| SourceError::Config {
            message: format!("table {}: {message}", self.id),
        };
        if self.stride_years == 0 {
            return Err(invalid("stride_years must be positive"));
        }
        if self.item_ids.is_empty() {
            return Err(invalid("item_ids must not be empty"));
        }
        if self.regions.is_empty() {
            return Err(invalid("at least one region is required"));
        }
        Ok(self)
    }
}

/// Parses and validates a table definition.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the TOML is malformed or the
/// definition is unusable.
pub fn parse_table_toml(toml_str: &str) -> Result<TableDefinition, SourceError> {
    toml::from_str::<TableDefinition>(toml_str)
        .map_err(|e| SourceError::Config {
            message: format!("failed to parse table definition: {e}"),
        })?
        .validate()
}

/// Returns the embedded population table definition.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the embedded TOML is invalid.
pub fn population_table() -> Result<TableDefinition, SourceError> {
    parse_table_toml(POPULATION_TABLE_TOML)
}
