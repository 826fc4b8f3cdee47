//! Sample period and request window planning.
//!
//! Sample periods are the Januaries from the table's start year up to the
//! horizon whose year offset from the start is a multiple of the stride
//! (2008, 2013, 2018, 2023 for the default configuration). Each one is
//! expanded into a [`RequestWindow`] by adding the table's window
//! increment to its `YYYYMM` encoding. Windows are never clipped to the
//! horizon; the API only returns what it has.

use population_source_models::{InvalidWindowStartError, RequestWindow, YearMonth};

use crate::table::TableDefinition;

/// Januaries of every `stride_years`-th year from `start_year` through
/// `horizon`, inclusive, in ascending order.
///
/// Returns an empty list when `stride_years` is zero or the horizon
/// precedes the first sample period.
#[must_use]
pub fn sample_periods(start_year: u16, stride_years: u16, horizon: YearMonth) -> Vec<YearMonth> {
    if stride_years == 0 {
        return Vec::new();
    }
    (start_year..=horizon.year())
        .filter(|year| (year - start_year) % stride_years == 0)
        .filter_map(|year| YearMonth::january(year).ok())
        .filter(|period| *period <= horizon)
        .collect()
}

/// Request windows for every sample period up to `horizon`.
///
/// # Errors
///
/// Returns [`InvalidWindowStartError`] if a window end does not decode to
/// a valid year-month, which only happens for an increment whose month
/// digits overflow December.
pub fn plan_windows(
    table: &TableDefinition,
    horizon: YearMonth,
) -> Result<Vec<RequestWindow>, InvalidWindowStartError> {
    sample_periods(table.start_year, table.stride_years, horizon)
        .into_iter()
        .map(|start| RequestWindow::from_january(start, table.window_increment))
        .collect()
}
