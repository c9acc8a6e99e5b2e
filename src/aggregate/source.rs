//! Statistics provider interfaces
//!
//! The persistence layer implements these; the core only consumes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DataQuality, GlobalStats, SeriesTrackPair, UserHistory};

/// Raw aggregate row for one (series, track) pair across all drivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatsSample {
    /// Number of races the aggregate covers
    pub race_count: u32,
    pub avg_incidents_per_race: f64,
    pub avg_position_std_dev: f64,
    pub avg_strength_of_field: f64,
    pub strength_of_field_std_dev: f64,
    pub attrition_rate: f64,
    pub avg_race_length_minutes: f64,
}

impl GlobalStatsSample {
    /// Convert to graded global stats, or `None` below `min_races`
    pub fn into_global_stats(self, min_races: u32) -> Option<GlobalStats> {
        if self.race_count < min_races {
            return None;
        }

        let quality = match DataQuality::from_sample(self.race_count) {
            // A configured minimum below the default still counts as trusted
            DataQuality::Default => DataQuality::Moderate,
            graded => graded,
        };

        Some(
            GlobalStats {
                avg_incidents_per_race: self.avg_incidents_per_race,
                avg_position_std_dev: self.avg_position_std_dev,
                avg_strength_of_field: self.avg_strength_of_field,
                strength_of_field_std_dev: self.strength_of_field_std_dev,
                attrition_rate: self.attrition_rate,
                avg_race_length_minutes: self.avg_race_length_minutes,
                race_count: self.race_count,
                data_quality: quality,
            }
            .sanitized(),
        )
    }
}

/// Reader for global per-pair aggregates
#[async_trait]
pub trait GlobalStatsSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the aggregate for a pair; `Ok(None)` when nothing is recorded
    async fn fetch_global_stats(&self, pair: SeriesTrackPair) -> Result<Option<GlobalStatsSample>>;
}

/// Reader for per-user aggregates
#[async_trait]
pub trait UserHistorySource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch series/track records, overall stats and licenses for a user
    async fn fetch_user_history(&self, user_id: u64) -> Result<UserHistory>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(race_count: u32) -> GlobalStatsSample {
        GlobalStatsSample {
            race_count,
            avg_incidents_per_race: 3.2,
            avg_position_std_dev: 6.5,
            avg_strength_of_field: 1800.0,
            strength_of_field_std_dev: 420.0,
            attrition_rate: 11.0,
            avg_race_length_minutes: 45.0,
        }
    }

    #[test]
    fn test_sample_below_minimum_is_rejected() {
        assert!(sample(9).into_global_stats(10).is_none());
    }

    #[test]
    fn test_sample_grading() {
        let stats = sample(12).into_global_stats(10).unwrap();
        assert_eq!(stats.data_quality, DataQuality::Moderate);
        assert_eq!(stats.avg_strength_of_field, 1800.0);

        let stats = sample(75).into_global_stats(10).unwrap();
        assert_eq!(stats.data_quality, DataQuality::High);

        let stats = sample(3).into_global_stats(2).unwrap();
        assert_eq!(stats.data_quality, DataQuality::Moderate);
    }

    #[test]
    fn test_sample_non_finite_fields_defaulted() {
        let mut raw = sample(30);
        raw.avg_position_std_dev = f64::NAN;
        let stats = raw.into_global_stats(10).unwrap();
        assert_eq!(stats.avg_position_std_dev, 8.0);
        assert_eq!(stats.avg_incidents_per_race, 3.2);
    }
}
