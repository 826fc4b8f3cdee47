//! Data horizon discovery.
//!
//! The most recent month worth requesting is published in an external
//! document as a line like `end_date = "202501"`. [`HorizonDiscovery`]
//! fetches that document, extracts the value, and records it in a
//! [`HorizonTracker`] whose version is bumped on every change. Consumers
//! remember the version they built against and ask
//! [`HorizonTracker::changed_since`] instead of comparing values
//! themselves.
//!
//! Discovery never fails loudly: an unreachable document or a missing
//! marker leaves the last known horizon in place.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use async_trait::async_trait;
use population_source_models::YearMonth;
use regex::Regex;

use crate::SourceError;
use crate::retry::{self, RetryPolicy};

/// Matches `end_date = "YYYYMM"` (single or double quotes).
static END_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"end_date\s*=\s*["'](\d{6})["']"#).expect("valid regex")
});

/// Extracts the horizon marker from a document.
///
/// Returns `None` if the marker is absent or its value is not a valid
/// year-month.
#[must_use]
pub fn extract_horizon(document: &str) -> Option<YearMonth> {
    END_DATE_RE
        .captures(document)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Supplies the raw horizon document.
#[async_trait]
pub trait HorizonSource: Send + Sync {
    /// Fetches the document text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a non-2xx status.
    async fn fetch_document(&self) -> Result<String, SourceError>;
}

/// Fetches the horizon document over HTTP.
pub struct HttpHorizonSource {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl HttpHorizonSource {
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl HorizonSource for HttpHorizonSource {
    async fn fetch_document(&self) -> Result<String, SourceError> {
        retry::send_text(&self.retry, || self.client.get(&self.url)).await
    }
}

/// The last known horizon and how many times it has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HorizonSnapshot {
    /// Last successfully discovered horizon; `None` until the first
    /// successful discovery.
    pub horizon: Option<YearMonth>,
    /// Incremented on every change; `0` means never discovered.
    pub version: u64,
}

/// Versioned, process-wide horizon state.
///
/// Only [`HorizonDiscovery`] writes to it.
#[derive(Debug, Default)]
pub struct HorizonTracker {
    state: RwLock<HorizonSnapshot>,
}

impl HorizonTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current horizon and version.
    #[must_use]
    pub fn snapshot(&self) -> HorizonSnapshot {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the horizon changed after `version` was observed.
    #[must_use]
    pub fn changed_since(&self, version: u64) -> bool {
        self.snapshot().version != version
    }

    /// Records a discovered horizon, bumping the version if it differs
    /// from the last known one.
    fn observe(&self, horizon: YearMonth) -> HorizonCheck {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.horizon == Some(horizon) {
            return HorizonCheck::Unchanged {
                horizon,
                version: state.version,
            };
        }
        let previous = state.horizon.replace(horizon);
        state.version += 1;
        HorizonCheck::Changed {
            previous,
            current: horizon,
            version: state.version,
        }
    }
}

/// Outcome of one discovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonCheck {
    /// Discovery succeeded and matched the last known horizon.
    Unchanged {
        /// The confirmed horizon.
        horizon: YearMonth,
        /// Tracker version.
        version: u64,
    },
    /// Discovery succeeded with a new horizon.
    Changed {
        /// Horizon known before this check.
        previous: Option<YearMonth>,
        /// Newly discovered horizon.
        current: YearMonth,
        /// Tracker version after the change.
        version: u64,
    },
    /// Discovery failed or is disabled; the last known horizon stands.
    Unknown,
}

impl HorizonCheck {
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Discovers the data horizon and tracks changes to it.
pub struct HorizonDiscovery {
    source: Option<Arc<dyn HorizonSource>>,
    tracker: HorizonTracker,
    check_lock: tokio::sync::Mutex<()>,
}

impl HorizonDiscovery {
    #[must_use]
    pub fn new(source: Arc<dyn HorizonSource>) -> Self {
        Self {
            source: Some(source),
            tracker: HorizonTracker::new(),
            check_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Discovery that never finds anything; the configured default
    /// horizon is used forever.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            source: None,
            tracker: HorizonTracker::new(),
            check_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds HTTP discovery for `url`, or disabled discovery when no URL
    /// is configured.
    #[must_use]
    pub fn from_url(client: reqwest::Client, url: Option<&str>) -> Self {
        url.map_or_else(Self::disabled, |url| {
            Self::new(Arc::new(HttpHorizonSource::new(client, url)))
        })
    }

    #[must_use]
    pub const fn tracker(&self) -> &HorizonTracker {
        &self.tracker
    }

    /// Fetches the horizon document and updates the tracker.
    ///
    /// Checks are serialized; concurrent callers wait for the one in
    /// progress and then run their own.
    pub async fn check(&self) -> HorizonCheck {
        let Some(source) = &self.source else {
            log::debug!("Horizon discovery disabled; keeping last known horizon");
            return HorizonCheck::Unknown;
        };

        let _guard = self.check_lock.lock().await;

        let document = match source.fetch_document().await {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Horizon discovery failed, keeping last known horizon: {e}");
                return HorizonCheck::Unknown;
            }
        };

        let Some(horizon) = extract_horizon(&document) else {
            log::warn!("Horizon document has no end_date marker, keeping last known horizon");
            return HorizonCheck::Unknown;
        };

        let check = self.tracker.observe(horizon);
        if let HorizonCheck::Changed {
            previous, current, ..
        } = check
        {
            match previous {
                Some(previous) => log::info!("Horizon changed: {previous} -> {current}"),
                None => log::info!("Horizon discovered: {current}"),
            }
        }
        check
    }
}
