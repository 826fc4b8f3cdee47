//! Runtime configuration: the embedded table definition plus environment
//! overrides.
//!
//! | variable | meaning |
//! |---|---|
//! | `KOSIS_API_KEY` | API credential (required for live fetches) |
//! | `POPULATION_HORIZON_URL` | overrides the table's `horizon_url` |
//! | `POPULATION_CONCURRENCY` | bound on in-flight API requests |

use crate::SourceError;
use crate::table::{TableDefinition, population_table};

/// Default bound on concurrently in-flight API requests.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Everything the pipeline needs to reach its remote sources.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// The statistics table being served.
    pub table: TableDefinition,
    /// API credential.
    pub api_key: Option<String>,
    /// Horizon document URL; discovery is disabled when absent.
    pub horizon_url: Option<String>,
    /// Maximum number of API requests in flight at once.
    pub concurrency: usize,
}

impl SourceConfig {
    /// Loads the embedded table and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the embedded table is invalid or
    /// `POPULATION_CONCURRENCY` is not a positive integer.
    pub fn from_env() -> Result<Self, SourceError> {
        let table = population_table()?;

        let concurrency = match std::env::var("POPULATION_CONCURRENCY") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| SourceError::Config {
                    message: format!("POPULATION_CONCURRENCY must be a positive integer, got {raw:?}"),
                })?,
            Err(_) => DEFAULT_CONCURRENCY,
        };

        let horizon_url = std::env::var("POPULATION_HORIZON_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| table.horizon_url.clone());

        let api_key = std::env::var("KOSIS_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            table,
            api_key,
            horizon_url,
            concurrency,
        })
    }

    /// Returns the API key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if `KOSIS_API_KEY` was not set.
    pub fn require_api_key(&self) -> Result<&str, SourceError> {
        self.api_key.as_deref().ok_or_else(|| SourceError::Config {
            message: "KOSIS_API_KEY is not set".to_string(),
        })
    }
}
