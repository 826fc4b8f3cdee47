#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Acquisition side of the population pipeline.
//!
//! - [`window`] computes the sample periods and request windows.
//! - [`horizon`] discovers the externally published data horizon and
//!   tracks when it changes.
//! - [`kosis`] issues one statistics API request per (region, window).
//! - [`normalize`] maps raw payload entries onto [`PopulationRecord`]s.
//!
//! [`PopulationRecord`]: population_source_models::PopulationRecord

pub mod config;
pub mod horizon;
pub mod kosis;
pub mod normalize;
pub mod progress;
pub mod retry;
pub mod table;
pub mod window;

/// Errors that can occur while talking to remote sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a status we do not retry.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
        /// Requested URL.
        url: String,
    },

    /// The response arrived but could not be interpreted.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },

    /// Embedded or environment configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}
