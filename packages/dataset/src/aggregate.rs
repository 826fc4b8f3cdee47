//! Per-region cohort and total series.

use population_dataset_models::{AggregatedSeries, CohortRecord, Dataset};

/// Aggregates every record in `region` (code or name).
///
/// An unknown region yields an empty series.
#[must_use]
pub fn aggregate_region(dataset: &Dataset, region: &str) -> AggregatedSeries {
    aggregate(region, dataset.records_in_region(region))
}

/// Like [`aggregate_region`], restricted to one item label (e.g. a single
/// sex) instead of summing across all items.
#[must_use]
pub fn aggregate_region_item(dataset: &Dataset, region: &str, item: &str) -> AggregatedSeries {
    aggregate(
        region,
        dataset
            .records_in_region(region)
            .filter(|r| r.record.item_label == item),
    )
}

fn aggregate<'a>(
    region: &str,
    records: impl Iterator<Item = &'a CohortRecord>,
) -> AggregatedSeries {
    let mut series = AggregatedSeries {
        region: region.to_string(),
        ..AggregatedSeries::default()
    };

    for r in records {
        *series
            .cohort_series
            .entry(r.record.period)
            .or_default()
            .entry(r.age_bucket)
            .or_default() += r.record.population;
    }

    // Totals are derived from the cohort sums so they match exactly.
    series.total_series = series
        .cohort_series
        .iter()
        .map(|(period, buckets)| (*period, buckets.values().sum()))
        .collect();

    series
}
