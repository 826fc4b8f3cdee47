//! Horizon-keyed, single-flight Dataset cache.
//!
//! The cache holds at most one [`Dataset`], tagged with the horizon
//! tracker version it was built against. A read is a hit only while the
//! tracker still reports that version; otherwise the caller takes the
//! build lock, and every concurrent caller waiting on the same lock picks
//! up the Dataset the first one published instead of building again.
//!
//! Datasets are swapped in whole. A failed build leaves whatever was
//! cached before in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use population_dataset_models::Dataset;
use population_source::horizon::{HorizonCheck, HorizonDiscovery, HorizonSnapshot};
use population_source::kosis::PopulationApi;
use population_source::progress::{ProgressCallback, null_progress};
use population_source::table::TableDefinition;
use population_source_models::YearMonth;
use tokio::sync::{Mutex, RwLock};

use crate::DatasetError;
use crate::build::build_dataset;

/// Memoizes the Dataset for the current horizon.
pub struct DatasetCache {
    api: Arc<dyn PopulationApi>,
    discovery: HorizonDiscovery,
    table: TableDefinition,
    concurrency: usize,
    progress: Arc<dyn ProgressCallback>,
    current: RwLock<Option<Arc<Dataset>>>,
    build_lock: Mutex<()>,
    rebuilds: AtomicU64,
}

impl DatasetCache {
    #[must_use]
    pub fn new(
        api: Arc<dyn PopulationApi>,
        discovery: HorizonDiscovery,
        table: TableDefinition,
        concurrency: usize,
    ) -> Self {
        Self {
            api,
            discovery,
            table,
            concurrency,
            progress: null_progress(),
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// Reports fan-out progress of every rebuild to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn table(&self) -> &TableDefinition {
        &self.table
    }

    /// Current horizon state as seen by discovery.
    #[must_use]
    pub fn horizon(&self) -> HorizonSnapshot {
        self.discovery.tracker().snapshot()
    }

    /// Horizon the next build would plan against: the last discovered
    /// one, or the table default if discovery has never succeeded.
    #[must_use]
    pub fn effective_horizon(&self) -> YearMonth {
        self.horizon().horizon.unwrap_or(self.table.default_horizon)
    }

    /// Number of Datasets built and published so far.
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// The cached Dataset if it is still current, without building.
    pub async fn cached(&self) -> Option<Arc<Dataset>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|ds| !self.discovery.tracker().changed_since(ds.horizon_version))
            .cloned()
    }

    /// Returns the Dataset for the current horizon, building it if
    /// needed.
    ///
    /// The first build runs horizon discovery before planning. Later
    /// horizon checks happen through [`Self::refresh_horizon`].
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the build could not produce a Dataset.
    pub async fn dataset(&self) -> Result<Arc<Dataset>, DatasetError> {
        if let Some(dataset) = self.cached().await {
            return Ok(dataset);
        }

        let _guard = self.build_lock.lock().await;

        // Another caller may have published while we waited.
        if let Some(dataset) = self.cached().await {
            return Ok(dataset);
        }

        if self.rebuild_count() == 0 && self.horizon().version == 0 {
            self.discovery.check().await;
        }

        self.rebuild().await
    }

    /// Re-checks the horizon. On change the cache is cleared before this
    /// returns, so no later read sees the old Dataset.
    ///
    /// Serialized with rebuilds: a check never runs while a Dataset is
    /// being assembled.
    pub async fn refresh_horizon(&self) -> HorizonCheck {
        let _guard = self.build_lock.lock().await;
        let check = self.discovery.check().await;
        if check.is_changed() {
            let stale = self.current.write().await.take();
            if let Some(stale) = stale {
                log::info!(
                    "[{}] Dropped dataset for horizon {} ({} records)",
                    self.table.id,
                    stale.horizon,
                    stale.records.len()
                );
            }
        }
        check
    }

    /// Must be called with the build lock held.
    async fn rebuild(&self) -> Result<Arc<Dataset>, DatasetError> {
        let snapshot = self.horizon();
        let horizon = snapshot.horizon.unwrap_or(self.table.default_horizon);

        log::info!(
            "[{}] Building dataset for horizon {horizon} (version {})",
            self.table.id,
            snapshot.version
        );

        let dataset = Arc::new(
            build_dataset(
                self.api.as_ref(),
                &self.table,
                horizon,
                snapshot.version,
                self.concurrency,
                &self.progress,
            )
            .await?,
        );

        *self.current.write().await = Some(Arc::clone(&dataset));
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use population_source::horizon::HorizonSource;
    use population_source::table::population_table;

    use super::*;
    use crate::test_support::{FakeApi, FakeHorizon, entry, ym};

    fn cache(api: &Arc<FakeApi>, horizon: &Arc<FakeHorizon>) -> DatasetCache {
        DatasetCache::new(
            Arc::clone(api) as Arc<dyn PopulationApi>,
            HorizonDiscovery::new(Arc::clone(horizon) as Arc<dyn HorizonSource>),
            population_table().unwrap(),
            4,
        )
    }

    fn seeded_api() -> FakeApi {
        FakeApi::new().with_records(
            "41250",
            "200801",
            vec![entry("20080101", "동두천시", "23세", "T2", "1000")],
        )
    }

    #[tokio::test]
    async fn first_access_discovers_horizon_and_builds() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = cache(&api, &horizon);

        let dataset = cache.dataset().await.unwrap();
        assert_eq!(dataset.horizon, ym("202501"));
        assert_eq!(dataset.horizon_version, 1);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn hits_do_not_touch_the_network() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = cache(&api, &horizon);

        let first = cache.dataset().await.unwrap();
        let calls = api.calls();
        let second = cache.dataset().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.calls(), calls);
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let api = Arc::new(seeded_api().with_jitter());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = Arc::new(cache(&api, &horizon));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.dataset().await.unwrap() })
            })
            .collect();

        let mut datasets = Vec::new();
        for handle in handles {
            datasets.push(handle.await.unwrap());
        }

        assert_eq!(cache.rebuild_count(), 1);
        assert_eq!(api.calls(), 40);
        assert!(datasets.iter().all(|ds| Arc::ptr_eq(ds, &datasets[0])));
    }

    #[tokio::test]
    async fn horizon_change_rebuilds_once_without_stale_regions() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = Arc::new(cache(&api, &horizon));

        let before = cache.dataset().await.unwrap();
        assert_eq!(before.region_names(), vec!["동두천시"]);

        api.clear_records();
        api.set_records(
            "41630",
            "202801",
            vec![entry("202801", "양주시", "40세", "T2", "321")],
        );
        horizon.publish("202801");

        assert!(cache.refresh_horizon().await.is_changed());
        assert!(cache.cached().await.is_none());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.dataset().await.unwrap() })
            })
            .collect();
        for handle in handles {
            let after = handle.await.unwrap();
            assert_eq!(after.horizon, ym("202801"));
            assert_eq!(after.region_names(), vec!["양주시"]);
        }

        assert_eq!(cache.rebuild_count(), 2);
        // 10 regions x 5 windows for the new horizon.
        assert_eq!(api.calls(), 40 + 50);
    }

    #[tokio::test]
    async fn unchanged_horizon_keeps_the_dataset() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = cache(&api, &horizon);

        let before = cache.dataset().await.unwrap();
        assert!(!cache.refresh_horizon().await.is_changed());
        let after = cache.dataset().await.unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_horizon_retains_dataset() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = cache(&api, &horizon);

        let before = cache.dataset().await.unwrap();
        horizon.go_offline();

        assert_eq!(cache.refresh_horizon().await, HorizonCheck::Unknown);
        assert_eq!(cache.effective_horizon(), ym("202501"));
        let after = cache.dataset().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_default_horizon_when_never_discovered() {
        let api = Arc::new(seeded_api());
        let horizon = Arc::new(FakeHorizon::default());
        let cache = cache(&api, &horizon);

        let dataset = cache.dataset().await.unwrap();
        assert_eq!(dataset.horizon, cache.table().default_horizon);
        assert_eq!(dataset.horizon_version, 0);
        assert_eq!(cache.rebuild_count(), 1);

        cache.dataset().await.unwrap();
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn failed_build_is_not_published() {
        let api = Arc::new(FakeApi::new().failing_everything());
        let horizon = Arc::new(FakeHorizon::publishing("202501"));
        let cache = cache(&api, &horizon);

        assert!(matches!(
            cache.dataset().await,
            Err(DatasetError::NoCoverage { .. })
        ));
        assert!(cache.cached().await.is_none());
        assert_eq!(cache.rebuild_count(), 0);
    }
}
