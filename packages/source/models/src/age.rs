//! Age cohorts and the mapping from the API's age labels onto them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Age label the API uses for the all-ages aggregate row.
pub const AGGREGATE_AGE_LABEL: &str = "계";

/// Age label the API uses for the open-ended top age.
pub const OPEN_ENDED_AGE_LABEL: &str = "100세 이상";

/// Suffix the API appends to single-year age labels.
const AGE_SUFFIX: char = '세';

/// One of the eight fixed, ordered age cohorts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AgeBucket {
    #[serde(rename = "00-14")]
    #[strum(serialize = "00-14")]
    Age00To14,
    #[serde(rename = "15-24")]
    #[strum(serialize = "15-24")]
    Age15To24,
    #[serde(rename = "25-34")]
    #[strum(serialize = "25-34")]
    Age25To34,
    #[serde(rename = "35-44")]
    #[strum(serialize = "35-44")]
    Age35To44,
    #[serde(rename = "45-54")]
    #[strum(serialize = "45-54")]
    Age45To54,
    #[serde(rename = "55-64")]
    #[strum(serialize = "55-64")]
    Age55To64,
    #[serde(rename = "65-74")]
    #[strum(serialize = "65-74")]
    Age65To74,
    /// Everyone 75 and over, including the open-ended `100세 이상` row.
    #[serde(rename = "75-99")]
    #[strum(serialize = "75-99")]
    Age75Plus,
}

/// Error returned when an age label cannot be mapped to a cohort.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgeLabelError {
    /// The all-ages aggregate label reached the bucketer.
    #[error("aggregate age label {0:?} cannot be bucketed")]
    Aggregate(String),
    /// The label is not `"<digits>세"`.
    #[error("unparseable age label {0:?}")]
    Unparseable(String),
}

impl AgeBucket {
    /// All cohorts in ascending age order.
    pub const ALL: [Self; 8] = [
        Self::Age00To14,
        Self::Age15To24,
        Self::Age25To34,
        Self::Age35To44,
        Self::Age45To54,
        Self::Age55To64,
        Self::Age65To74,
        Self::Age75Plus,
    ];

    /// Returns the cohort containing `age` years.
    #[must_use]
    pub const fn for_age(age: u32) -> Self {
        match age {
            0..=14 => Self::Age00To14,
            15..=24 => Self::Age15To24,
            25..=34 => Self::Age25To34,
            35..=44 => Self::Age35To44,
            45..=54 => Self::Age45To54,
            55..=64 => Self::Age55To64,
            65..=74 => Self::Age65To74,
            _ => Self::Age75Plus,
        }
    }

    /// Maps an API age label (`"23세"`, `"100세 이상"`) to its cohort.
    ///
    /// # Errors
    ///
    /// Returns [`AgeLabelError::Aggregate`] for the all-ages label, which
    /// must be filtered out before bucketing, and
    /// [`AgeLabelError::Unparseable`] if the label is not a number of
    /// years.
    pub fn from_age_label(label: &str) -> Result<Self, AgeLabelError> {
        if label == OPEN_ENDED_AGE_LABEL {
            return Ok(Self::Age75Plus);
        }
        if label == AGGREGATE_AGE_LABEL {
            return Err(AgeLabelError::Aggregate(label.to_string()));
        }
        label
            .strip_suffix(AGE_SUFFIX)
            .unwrap_or(label)
            .trim()
            .parse::<u32>()
            .map(Self::for_age)
            .map_err(|_| AgeLabelError::Unparseable(label.to_string()))
    }
}
