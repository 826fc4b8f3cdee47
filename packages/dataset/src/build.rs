//! Fans requests out over the (region × window) grid and assembles the
//! results into a [`Dataset`].
//!
//! Requests share no state and run with bounded concurrency. Assembly
//! only starts once every request has completed or failed, and results
//! are assembled in grid order regardless of completion order, so the
//! same responses always produce the same Dataset.

use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use population_dataset_models::{
    CohortRecord, CoverageReport, Dataset, EmptyWindow, FailedWindow, RejectedRecord,
};
use population_source::SourceError;
use population_source::kosis::{PopulationApi, WindowPayload};
use population_source::normalize::{RecordError, normalize_entry};
use population_source::progress::ProgressCallback;
use population_source::table::TableDefinition;
use population_source::window::plan_windows;
use population_source_models::{AgeBucket, RegionCode, RequestWindow, YearMonth};

use crate::DatasetError;

/// Every (region, window) pair to request, region-major.
#[must_use]
pub fn request_grid(
    regions: &[RegionCode],
    windows: &[RequestWindow],
) -> Vec<(RegionCode, RequestWindow)> {
    regions
        .iter()
        .flat_map(|region| windows.iter().map(move |window| (region.clone(), *window)))
        .collect()
}

/// Builds the Dataset for `horizon`.
///
/// Per-request failures are recorded in the coverage report instead of
/// aborting the build.
///
/// # Errors
///
/// Returns [`DatasetError::Window`] if window planning fails and
/// [`DatasetError::NoCoverage`] if every request failed.
pub async fn build_dataset(
    api: &dyn PopulationApi,
    table: &TableDefinition,
    horizon: YearMonth,
    horizon_version: u64,
    concurrency: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Dataset, DatasetError> {
    let windows = plan_windows(table, horizon)?;
    let grid = request_grid(&table.region_codes(), &windows);

    log::info!(
        "[{}] Requesting {} windows x {} regions = {} requests (horizon {horizon}, concurrency {concurrency})",
        table.id,
        windows.len(),
        table.regions.len(),
        grid.len(),
    );

    progress.set_total(grid.len() as u64);
    progress.set_message(format!("Fetching {} (horizon {horizon})", table.table_id));

    // Owned pairs keep the fan-out future `Send` for spawned callers.
    let requests = grid.clone().into_iter().enumerate();
    let mut responses: Vec<(usize, Result<WindowPayload, SourceError>)> =
        stream::iter(requests.map(|(index, (region, window))| async move {
            let result = api.fetch_window(&region, window).await;
            progress.inc(1);
            (index, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    responses.sort_by_key(|(index, _)| *index);

    let mut records = Vec::new();
    let mut coverage = CoverageReport {
        requested: grid.len(),
        ..CoverageReport::default()
    };

    for ((region, window), (_, response)) in grid.into_iter().zip(responses) {
        match response {
            Err(e) => {
                log::warn!("[{}] {region} {window} failed: {e}", table.id);
                coverage.failed_windows.push(FailedWindow {
                    region,
                    window,
                    error: e.to_string(),
                });
            }
            Ok(WindowPayload::NoData { reason }) => {
                log::debug!("[{}] {region} {window}: no data ({reason})", table.id);
                coverage.empty_windows.push(EmptyWindow {
                    region,
                    window,
                    reason,
                });
            }
            Ok(WindowPayload::Records(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    match bucket_entry(&region, entry) {
                        Ok(Some(record)) => records.push(record),
                        Ok(None) => {}
                        Err(e) => {
                            log::warn!(
                                "[{}] {region} {window}: dropping entry {index}: {e}",
                                table.id
                            );
                            coverage.rejected_records.push(RejectedRecord {
                                region: region.clone(),
                                window,
                                index,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    if coverage.requested > 0 && coverage.failed_windows.len() == coverage.requested {
        progress.finish(format!("All {} requests failed", coverage.requested));
        return Err(DatasetError::NoCoverage {
            requested: coverage.requested,
        });
    }

    progress.finish(format!(
        "{} records from {} requests",
        records.len(),
        coverage.requested
    ));
    log::info!(
        "[{}] Built dataset: {} records, {} succeeded, {} empty, {} failed, {} entries dropped",
        table.id,
        records.len(),
        coverage.succeeded(),
        coverage.empty_windows.len(),
        coverage.failed_windows.len(),
        coverage.rejected_records.len(),
    );

    Ok(Dataset {
        horizon,
        horizon_version,
        built_at: chrono::Utc::now(),
        records,
        coverage,
    })
}

/// Normalizes one entry and assigns its cohort. Aggregate rows yield
/// `Ok(None)`.
fn bucket_entry(
    region: &RegionCode,
    entry: &serde_json::Value,
) -> Result<Option<CohortRecord>, RecordError> {
    let Some(record) = normalize_entry(region, entry)? else {
        return Ok(None);
    };
    let age_bucket = AgeBucket::from_age_label(&record.age_label)?;
    Ok(Some(CohortRecord { record, age_bucket }))
}

#[cfg(test)]
mod tests {
    use population_source::progress::null_progress;
    use population_source::table::population_table;

    use super::*;
    use crate::test_support::{FakeApi, entry, ym};

    #[test]
    fn grid_is_region_major() {
        let regions = vec![RegionCode::new("41250"), RegionCode::new("41630")];
        let windows = vec![
            RequestWindow::from_january(ym("200801"), 411).unwrap(),
            RequestWindow::from_january(ym("201301"), 411).unwrap(),
        ];
        let grid = request_grid(&regions, &windows);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0], (regions[0].clone(), windows[0]));
        assert_eq!(grid[1], (regions[0].clone(), windows[1]));
        assert_eq!(grid[2], (regions[1].clone(), windows[0]));
    }

    #[tokio::test]
    async fn requests_every_region_and_window() {
        let table = population_table().unwrap();
        let api = FakeApi::new();
        let dataset = build_dataset(&api, &table, ym("202501"), 0, 3, &null_progress())
            .await
            .unwrap();

        assert_eq!(api.calls(), 40);
        assert_eq!(dataset.coverage.requested, 40);
        assert_eq!(dataset.coverage.empty_windows.len(), 40);
        assert!(dataset.records.is_empty());
        assert!(!dataset.is_partial());
    }

    #[tokio::test]
    async fn normalizes_and_buckets_records() {
        let table = population_table().unwrap();
        let api = FakeApi::new().with_records(
            "41250",
            "200801",
            vec![
                entry("20080101", "동두천시", "23세", "T2", "1000"),
                entry("20080101", "동두천시", "100세 이상", "T2", "5"),
                entry("20080101", "동두천시", "계", "T2", "1005"),
            ],
        );

        let dataset = build_dataset(&api, &table, ym("202501"), 0, 4, &null_progress())
            .await
            .unwrap();

        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].age_bucket, AgeBucket::Age15To24);
        assert_eq!(dataset.records[1].age_bucket, AgeBucket::Age75Plus);
        assert_eq!(dataset.coverage.empty_windows.len(), 39);
        assert!(!dataset.is_partial());
    }

    #[tokio::test]
    async fn isolates_failed_windows_and_bad_entries() {
        let table = population_table().unwrap();
        let api = FakeApi::new()
            .with_records(
                "41250",
                "200801",
                vec![
                    entry("200801", "동두천시", "23세", "T2", "1000"),
                    entry("200801", "동두천시", "24세", "T2", "-"),
                    entry("200801", "동두천시", "스무살", "T2", "7"),
                ],
            )
            .with_failure("41630", "200801");

        let dataset = build_dataset(&api, &table, ym("202501"), 0, 4, &null_progress())
            .await
            .unwrap();

        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.coverage.failed_windows.len(), 1);
        assert_eq!(dataset.coverage.failed_windows[0].region.as_str(), "41630");
        assert_eq!(dataset.coverage.rejected_records.len(), 2);
        assert_eq!(dataset.coverage.rejected_records[0].index, 1);
        assert_eq!(dataset.coverage.rejected_records[1].index, 2);
        assert!(dataset.is_partial());
    }

    #[tokio::test]
    async fn refuses_to_publish_when_everything_failed() {
        let table = population_table().unwrap();
        let api = FakeApi::new().failing_everything();

        let result = build_dataset(&api, &table, ym("202501"), 0, 4, &null_progress()).await;
        assert!(matches!(
            result,
            Err(DatasetError::NoCoverage { requested: 40 })
        ));
    }

    #[tokio::test]
    async fn rebuilding_with_same_responses_is_idempotent() {
        let table = population_table().unwrap();
        let api = FakeApi::new()
            .with_records(
                "41250",
                "200801",
                vec![entry("200801", "동두천시", "23세", "T2", "1000")],
            )
            .with_records(
                "41630",
                "201301",
                vec![entry("201301", "양주시", "40세", "T3", "321")],
            )
            .with_jitter();

        let first = build_dataset(&api, &table, ym("202501"), 0, 8, &null_progress())
            .await
            .unwrap();
        let second = build_dataset(&api, &table, ym("202501"), 0, 8, &null_progress())
            .await
            .unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(first.coverage, second.coverage);
    }

    #[tokio::test]
    async fn horizon_before_start_builds_empty_dataset() {
        let table = population_table().unwrap();
        let api = FakeApi::new();
        let dataset = build_dataset(&api, &table, ym("200712"), 0, 4, &null_progress())
            .await
            .unwrap();
        assert_eq!(api.calls(), 0);
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.coverage.requested, 0);
    }
}
