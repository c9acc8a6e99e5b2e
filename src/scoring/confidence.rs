//! Confidence classification for personal data
//!
//! Every decision about whether to trust personal history over the global
//! fallback goes through [`confidence_level`] or its thresholded variant.

use serde::{Deserialize, Serialize};

use crate::types::DataQuality;

/// Races required before personal data is trusted outright
pub const HIGH_CONFIDENCE_RACES: u32 = 3;

/// Stricter threshold used for finishing-position consistency
pub const HIGH_CONSISTENCY_RACES: u32 = 5;

/// How much a factor relies on observed personal data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// No personal observations
    NoData,
    /// Some observations, blended with fallback data
    Estimated,
    /// Enough observations to use personal data directly
    High,
}

impl Confidence {
    pub fn is_high(&self) -> bool {
        matches!(self, Confidence::High)
    }

    /// Cap the level at `max`
    pub fn capped(self, max: Confidence) -> Self {
        self.min(max)
    }
}

/// Classify an observation count with the default threshold
pub fn confidence_level(observation_count: u32) -> Confidence {
    confidence_level_with_threshold(observation_count, HIGH_CONFIDENCE_RACES)
}

/// Classify an observation count against a custom `high` threshold
pub fn confidence_level_with_threshold(observation_count: u32, high_threshold: u32) -> Confidence {
    if observation_count >= high_threshold {
        Confidence::High
    } else if observation_count >= 1 {
        Confidence::Estimated
    } else {
        Confidence::NoData
    }
}

/// Confidence of a factor that prefers exact data and falls back to a blend
///
/// Below the threshold the factor blends overall history with global data,
/// which can never be better than `Estimated`.
pub fn blended_confidence(exact_races: u32, overall_races: u32, high_threshold: u32) -> Confidence {
    let exact = confidence_level_with_threshold(exact_races, high_threshold);
    if exact.is_high() {
        return exact;
    }
    let fallback = confidence_level(exact_races.max(overall_races));
    fallback.capped(Confidence::Estimated)
}

/// Per-factor data confidence attached to every score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfidence {
    pub performance: Confidence,
    pub safety: Confidence,
    pub consistency: Confidence,
    pub familiarity: Confidence,
    /// Grade of the opportunity's global statistics
    pub global_stats: DataQuality,
}

impl DataConfidence {
    /// Build the report from the same counts the factor calculations use
    ///
    /// `performance` is the label of the branch the performance estimate
    /// took, since it can ignore overall history entirely.
    pub fn evaluate(
        performance: Confidence,
        exact_races: u32,
        overall_races: u32,
        global_stats: DataQuality,
    ) -> Self {
        Self {
            performance,
            safety: blended_confidence(exact_races, overall_races, HIGH_CONFIDENCE_RACES),
            consistency: blended_confidence(exact_races, overall_races, HIGH_CONSISTENCY_RACES),
            familiarity: confidence_level(exact_races),
            global_stats,
        }
    }
}
