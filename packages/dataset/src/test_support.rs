//! Scripted API and horizon sources for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use population_source::SourceError;
use population_source::horizon::HorizonSource;
use population_source::kosis::{PopulationApi, WindowPayload};
use population_source_models::{RegionCode, RequestWindow, YearMonth};
use serde_json::json;

pub fn ym(s: &str) -> YearMonth {
    s.parse().unwrap()
}

pub fn entry(period: &str, region: &str, age: &str, item: &str, count: &str) -> serde_json::Value {
    json!({
        "PRD_DE": period,
        "C1_NM": region,
        "C2_NM": age,
        "ITM_NM": item,
        "DT": count,
    })
}

fn unreachable() -> SourceError {
    SourceError::Normalization {
        message: "connection refused".to_string(),
    }
}

type Key = (String, String);

/// Answers every request with "no data" unless scripted otherwise.
#[derive(Default)]
pub struct FakeApi {
    records: Mutex<BTreeMap<Key, Vec<serde_json::Value>>>,
    failures: Mutex<BTreeSet<Key>>,
    fail_all: bool,
    jitter: bool,
    calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, region: &str, start: &str, entries: Vec<serde_json::Value>) -> Self {
        self.set_records(region, start, entries);
        self
    }

    pub fn with_failure(self, region: &str, start: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((region.to_string(), start.to_string()));
        self
    }

    pub fn failing_everything(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Makes responses complete out of request order.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn set_records(&self, region: &str, start: &str, entries: Vec<serde_json::Value>) {
        self.records
            .lock()
            .unwrap()
            .insert((region.to_string(), start.to_string()), entries);
    }

    pub fn clear_records(&self) {
        self.records.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PopulationApi for FakeApi {
    async fn fetch_window(
        &self,
        region: &RegionCode,
        window: RequestWindow,
    ) -> Result<WindowPayload, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            tokio::time::sleep(Duration::from_millis(((call * 7) % 5) as u64)).await;
        } else {
            tokio::task::yield_now().await;
        }

        let key = (region.as_str().to_string(), window.start.to_string());
        if self.fail_all || self.failures.lock().unwrap().contains(&key) {
            return Err(unreachable());
        }

        Ok(self.records.lock().unwrap().get(&key).map_or_else(
            || WindowPayload::NoData {
                reason: "-1: no data".to_string(),
            },
            |entries| WindowPayload::Records(entries.clone()),
        ))
    }
}

/// Serves whatever document is currently set, or fails when unset.
#[derive(Default)]
pub struct FakeHorizon {
    document: Mutex<Option<String>>,
}

impl FakeHorizon {
    pub fn publishing(horizon: &str) -> Self {
        let source = Self::default();
        source.publish(horizon);
        source
    }

    pub fn publish(&self, horizon: &str) {
        *self.document.lock().unwrap() = Some(format!("end_date = \"{horizon}\"\n"));
    }

    pub fn go_offline(&self) {
        *self.document.lock().unwrap() = None;
    }
}

#[async_trait]
impl HorizonSource for FakeHorizon {
    async fn fetch_document(&self) -> Result<String, SourceError> {
        self.document.lock().unwrap().clone().ok_or_else(unreachable)
    }
}
