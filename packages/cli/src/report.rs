//! Plain-text tables printed by the CLI.

use population_dataset_models::{AggregatedSeries, Dataset};
use population_source::table::TableDefinition;
use population_source_models::{AgeBucket, RequestWindow, YearMonth};

/// The request grid for `horizon`.
pub fn format_windows(
    table: &TableDefinition,
    horizon: YearMonth,
    windows: &[RequestWindow],
) -> String {
    let mut out = format!("{} ({}), horizon {horizon}\n", table.name, table.table_id);
    out.push_str(&format!("{:<8} {:<8}\n", "START", "END"));
    out.push_str(&"-".repeat(17));
    out.push('\n');
    for window in windows {
        out.push_str(&format!("{:<8} {:<8}\n", window.start, window.end));
    }
    out.push_str(&format!(
        "{} windows x {} regions = {} requests\n",
        windows.len(),
        table.regions.len(),
        windows.len() * table.regions.len()
    ));
    out
}

/// Configured regions, with the API-reported name where the dataset has
/// one. With a dataset, also lists the item labels `--item` accepts.
pub fn format_regions(table: &TableDefinition, dataset: Option<&Dataset>) -> String {
    let mut out = format!("{:<8} {:<16} NAME\n", "CODE", "LABEL");
    out.push_str(&"-".repeat(40));
    out.push('\n');
    for region in &table.regions {
        let name = dataset
            .and_then(|ds| ds.records_in_region(region.code.as_str()).next())
            .map_or("", |r| r.record.region_name.as_str());
        out.push_str(&format!("{:<8} {:<16} {name}\n", region.code, region.label));
    }
    if let Some(dataset) = dataset {
        out.push_str(&format!("\nItems: {}\n", dataset.item_labels().join(", ")));
    }
    out
}

/// Summary of what a build requested and what it got.
pub fn format_coverage(dataset: &Dataset) -> String {
    let coverage = &dataset.coverage;
    let mut out = format!(
        "Horizon {} (version {}), built {}\n",
        dataset.horizon,
        dataset.horizon_version,
        dataset.built_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str(&format!("Records:   {}\n", dataset.records.len()));
    out.push_str(&format!("Requests:  {}\n", coverage.requested));
    out.push_str(&format!("  with data: {}\n", coverage.succeeded()));
    out.push_str(&format!("  no data:   {}\n", coverage.empty_windows.len()));
    out.push_str(&format!("  failed:    {}\n", coverage.failed_windows.len()));
    out.push_str(&format!("Dropped records: {}\n", coverage.rejected_records.len()));

    for failed in &coverage.failed_windows {
        out.push_str(&format!(
            "  FAILED {} {}: {}\n",
            failed.region, failed.window, failed.error
        ));
    }
    for rejected in &coverage.rejected_records {
        out.push_str(&format!(
            "  DROPPED {} {} #{}: {}\n",
            rejected.region, rejected.window, rejected.index, rejected.error
        ));
    }
    if dataset.is_partial() {
        out.push_str("WARNING: dataset is partial\n");
    }
    out
}

/// One row per period: each cohort, then the total.
pub fn format_series(series: &AggregatedSeries) -> String {
    let mut out = format!("{:<8}", "PERIOD");
    for bucket in AgeBucket::ALL {
        out.push_str(&format!(" {:>10}", bucket.to_string()));
    }
    out.push_str(&format!(" {:>11}\n", "TOTAL"));

    for (period, buckets) in &series.cohort_series {
        out.push_str(&format!("{period:<8}"));
        for bucket in AgeBucket::ALL {
            let value = buckets.get(&bucket).copied().unwrap_or_default();
            out.push_str(&format!(" {value:>10.0}"));
        }
        let total = series.total_series.get(period).copied().unwrap_or_default();
        out.push_str(&format!(" {total:>11.0}\n"));
    }

    if series.is_empty() {
        out.push_str(&format!("(no data for {})\n", series.region));
    }
    out
}
