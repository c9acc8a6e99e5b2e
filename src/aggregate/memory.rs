//! In-memory statistics sources
//!
//! Back the offline CLI and embedding callers that already hold their
//! aggregates, e.g. loaded from a JSON export.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::source::{GlobalStatsSample, GlobalStatsSource, UserHistorySource};
use crate::error::{Error, Result};
use crate::types::{GlobalStats, Opportunity, SeriesTrackPair, UserHistory};

impl From<&GlobalStats> for GlobalStatsSample {
    fn from(stats: &GlobalStats) -> Self {
        Self {
            race_count: stats.race_count,
            avg_incidents_per_race: stats.avg_incidents_per_race,
            avg_position_std_dev: stats.avg_position_std_dev,
            avg_strength_of_field: stats.avg_strength_of_field,
            strength_of_field_std_dev: stats.strength_of_field_std_dev,
            attrition_rate: stats.attrition_rate,
            avg_race_length_minutes: stats.avg_race_length_minutes,
        }
    }
}

/// One exported aggregate row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStatsRecord {
    pub series_id: u32,
    pub track_id: u32,
    #[serde(flatten)]
    pub sample: GlobalStatsSample,
}

/// Global stats held in a map
#[derive(Debug, Default)]
pub struct MemoryStatsSource {
    samples: HashMap<SeriesTrackPair, GlobalStatsSample>,
}

impl MemoryStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = GlobalStatsRecord>) -> Self {
        let samples = records
            .into_iter()
            .map(|r| (SeriesTrackPair::new(r.series_id, r.track_id), r.sample))
            .collect();
        Self { samples }
    }

    /// Use the statistics already attached to each opportunity
    ///
    /// Opportunities without recorded races contribute nothing.
    pub fn from_opportunities<'a>(opportunities: impl IntoIterator<Item = &'a Opportunity>) -> Self {
        let samples = opportunities
            .into_iter()
            .filter(|o| o.global_stats.race_count > 0)
            .map(|o| (o.pair(), GlobalStatsSample::from(&o.global_stats)))
            .collect();
        Self { samples }
    }

    pub fn insert(&mut self, pair: SeriesTrackPair, sample: GlobalStatsSample) {
        self.samples.insert(pair, sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl GlobalStatsSource for MemoryStatsSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_global_stats(&self, pair: SeriesTrackPair) -> Result<Option<GlobalStatsSample>> {
        Ok(self.samples.get(&pair).cloned())
    }
}

/// User histories held in a map
#[derive(Debug, Default)]
pub struct MemoryHistorySource {
    histories: HashMap<u64, UserHistory>,
}

impl MemoryHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: u64, history: UserHistory) -> Self {
        self.histories.insert(user_id, history);
        self
    }

    pub fn insert(&mut self, user_id: u64, history: UserHistory) {
        self.histories.insert(user_id, history);
    }
}

#[async_trait]
impl UserHistorySource for MemoryHistorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_user_history(&self, user_id: u64) -> Result<UserHistory> {
        self.histories
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::UserHistory {
                user_id,
                reason: "no history recorded".to_string(),
            })
    }
}
