//! Multi-key-space cache used by the recommender
//!
//! Holds global stats per (series, track), user histories per user and
//! computed scores per (user, opportunity, mode). Scores are derived from
//! the other two key spaces, so replacing or invalidating an input also
//! drops every score computed from it.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{spawn_sweeper, CacheStatsSnapshot, Sweep, TtlCache};
use crate::scoring::{Mode, Score};
use crate::types::{GlobalStats, Opportunity, SeriesTrackPair, UserHistory};

/// Configuration for the cache system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for global stats entries (seconds)
    #[serde(default = "default_global_stats_ttl")]
    pub global_stats_ttl_secs: u64,
    /// TTL for user history entries (seconds)
    #[serde(default = "default_user_history_ttl")]
    pub user_history_ttl_secs: u64,
    /// TTL for computed scores (seconds)
    #[serde(default = "default_score_ttl")]
    pub score_ttl_secs: u64,
    /// Interval between background sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_global_stats_ttl() -> u64 {
    900 // 15 minutes
}

fn default_user_history_ttl() -> u64 {
    300 // 5 minutes
}

fn default_score_ttl() -> u64 {
    120 // 2 minutes
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global_stats_ttl_secs: default_global_stats_ttl(),
            user_history_ttl_secs: default_user_history_ttl(),
            score_ttl_secs: default_score_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Identity of a cached score
///
/// Global stats are left out of `descriptor`; they are kept coherent by
/// invalidation when the stats key space changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreKey {
    pub user_id: u64,
    pub pair: SeriesTrackPair,
    pub season_year: u16,
    pub season_quarter: u8,
    pub race_week: u8,
    pub mode: Mode,
    /// Fingerprint of the descriptor fields the score reads
    pub descriptor: u64,
}

impl ScoreKey {
    pub fn new(user_id: u64, opportunity: &Opportunity, mode: Mode) -> Self {
        Self {
            user_id,
            pair: opportunity.pair(),
            season_year: opportunity.season_year,
            season_quarter: opportunity.season_quarter,
            race_week: opportunity.race_week,
            mode,
            descriptor: descriptor_fingerprint(opportunity),
        }
    }
}

fn descriptor_fingerprint(opportunity: &Opportunity) -> u64 {
    let mut hasher = DefaultHasher::new();
    opportunity.series_name.hash(&mut hasher);
    opportunity.track_name.hash(&mut hasher);
    opportunity.license_level.hash(&mut hasher);
    opportunity.category.hash(&mut hasher);
    opportunity.race_length_minutes.to_bits().hash(&mut hasher);
    opportunity.fixed_setup.hash(&mut hasher);
    for slot in &opportunity.time_slots {
        slot.hour.hash(&mut hasher);
        slot.day_of_week.hash(&mut hasher);
        slot.strength_of_field.to_bits().hash(&mut hasher);
        slot.participants.hash(&mut hasher);
    }
    hasher.finish()
}

/// Statistics for every key space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecommendationCacheStats {
    pub global_stats: CacheStatsSnapshot,
    pub user_history: CacheStatsSnapshot,
    pub scores: CacheStatsSnapshot,
}

/// Cache system shared by the batch aggregator and the recommender
pub struct RecommendationCache {
    config: CacheConfig,
    global_stats: TtlCache<SeriesTrackPair, GlobalStats>,
    user_history: TtlCache<u64, UserHistory>,
    scores: TtlCache<ScoreKey, Score>,
    shutdown: broadcast::Sender<()>,
}

impl RecommendationCache {
    /// Create a new cache with default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a new cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            global_stats: TtlCache::new(
                "global_stats",
                Duration::from_secs(config.global_stats_ttl_secs),
            ),
            user_history: TtlCache::new(
                "user_history",
                Duration::from_secs(config.user_history_ttl_secs),
            ),
            scores: TtlCache::new("scores", Duration::from_secs(config.score_ttl_secs)),
            shutdown,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get_global_stats(&self, pair: &SeriesTrackPair) -> Option<GlobalStats> {
        self.global_stats.get(pair)
    }

    /// Store global stats, dropping scores derived from a different value
    ///
    /// A missing or expired previous entry counts as different: scores may
    /// outlive the stats they were computed from.
    pub fn set_global_stats(&self, pair: SeriesTrackPair, stats: GlobalStats) {
        let changed = self
            .global_stats
            .peek(&pair)
            .map_or(true, |previous| previous != stats);
        self.global_stats.insert(pair, stats);
        if changed {
            self.drop_scores_for_pair(pair);
        }
    }

    pub fn get_user_history(&self, user_id: u64) -> Option<UserHistory> {
        self.user_history.get(&user_id)
    }

    /// Store a user history, dropping scores derived from a different value
    ///
    /// A missing or expired previous entry counts as different.
    pub fn set_user_history(&self, user_id: u64, history: UserHistory) {
        let changed = self
            .user_history
            .peek(&user_id)
            .map_or(true, |previous| previous != history);
        self.user_history.insert(user_id, history);
        if changed {
            self.drop_scores_for_user(user_id);
        }
    }

    pub fn get_score(&self, key: &ScoreKey) -> Option<Score> {
        self.scores.get(key)
    }

    pub fn set_score(&self, key: ScoreKey, score: Score) {
        self.scores.insert(key, score);
    }

    /// Forget a user's history and every score computed for them
    pub fn invalidate_user(&self, user_id: u64) -> usize {
        let history = usize::from(self.user_history.delete(&user_id));
        history + self.drop_scores_for_user(user_id)
    }

    /// Forget a pair's global stats and every score computed from them
    pub fn invalidate_pair(&self, pair: SeriesTrackPair) -> usize {
        let stats = usize::from(self.global_stats.delete(&pair));
        stats + self.drop_scores_for_pair(pair)
    }

    fn drop_scores_for_user(&self, user_id: u64) -> usize {
        let removed = self.scores.retain(|key| key.user_id != user_id);
        debug!(user_id, removed, "Dropped cached scores for user");
        removed
    }

    fn drop_scores_for_pair(&self, pair: SeriesTrackPair) -> usize {
        let removed = self.scores.retain(|key| key.pair != pair);
        debug!(pair = %pair, removed, "Dropped cached scores for series/track");
        removed
    }

    /// Clear all caches
    pub fn clear(&self) {
        self.global_stats.clear();
        self.user_history.clear();
        self.scores.clear();
    }

    /// Get total number of cached items
    pub fn total_cached_items(&self) -> usize {
        self.global_stats.len() + self.user_history.len() + self.scores.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> RecommendationCacheStats {
        RecommendationCacheStats {
            global_stats: self.global_stats.stats().snapshot(),
            user_history: self.user_history.stats().snapshot(),
            scores: self.scores.stats().snapshot(),
        }
    }

    /// Start the periodic sweep of every key space
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        spawn_sweeper(self.clone(), period, self.shutdown.subscribe())
    }

    /// Stop a running sweeper
    pub fn stop_sweeper(&self) {
        // No receivers just means no sweeper is running
        let _ = self.shutdown.send(());
    }
}

impl Default for RecommendationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweep for RecommendationCache {
    fn sweep_expired(&self) -> usize {
        self.global_stats.sweep() + self.user_history.sweep() + self.scores.sweep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringEngine;
    use crate::types::{Category, LicenseLevel, OverallStats};

    fn opportunity(series_id: u32, track_id: u32) -> Opportunity {
        Opportunity {
            series_id,
            series_name: "Advanced Mazda MX-5 Cup".to_string(),
            track_id,
            track_name: "Okayama".to_string(),
            license_level: LicenseLevel::D,
            category: Category::SportsCar,
            season_year: 2026,
            season_quarter: 4,
            race_week: 2,
            race_length_minutes: 25.0,
            fixed_setup: true,
            time_slots: Vec::new(),
            global_stats: GlobalStats::default(),
        }
    }

    fn cache_with_scores() -> RecommendationCache {
        let cache = RecommendationCache::new();
        let engine = ScoringEngine::new();
        let history = UserHistory::default();
        // Inputs first: storing them drops scores computed earlier
        cache.set_global_stats(SeriesTrackPair::new(10, 20), GlobalStats::default());
        for user_id in [1, 2] {
            cache.set_user_history(user_id, history.clone());
            for (series_id, track_id) in [(10, 20), (11, 21)] {
                let opp = opportunity(series_id, track_id);
                let score = engine.score(&opp, &history, Mode::Balanced);
                cache.set_score(ScoreKey::new(user_id, &opp, Mode::Balanced), score);
            }
        }
        cache
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.global_stats_ttl_secs, 900);
        assert_eq!(config.score_ttl_secs, 120);
    }

    #[test]
    fn test_invalidate_user_drops_scores() {
        let cache = cache_with_scores();
        assert_eq!(cache.invalidate_user(1), 3);
        assert!(cache.get_user_history(1).is_none());
        assert!(cache.get_user_history(2).is_some());

        let opp = opportunity(10, 20);
        assert!(cache.get_score(&ScoreKey::new(1, &opp, Mode::Balanced)).is_none());
        assert!(cache.get_score(&ScoreKey::new(2, &opp, Mode::Balanced)).is_some());
    }

    #[test]
    fn test_invalidate_pair_drops_scores() {
        let cache = cache_with_scores();
        assert_eq!(cache.invalidate_pair(SeriesTrackPair::new(10, 20)), 3);

        let stale = opportunity(10, 20);
        let fresh = opportunity(11, 21);
        assert!(cache.get_score(&ScoreKey::new(1, &stale, Mode::Balanced)).is_none());
        assert!(cache.get_score(&ScoreKey::new(1, &fresh, Mode::Balanced)).is_some());
    }

    #[test]
    fn test_replacing_inputs_keeps_scores_coherent() {
        let cache = cache_with_scores();
        let pair = SeriesTrackPair::new(10, 20);
        let opp = opportunity(10, 20);
        let key = ScoreKey::new(1, &opp, Mode::Balanced);

        // Same value: scores survive
        cache.set_global_stats(pair, GlobalStats::default());
        assert!(cache.get_score(&key).is_some());

        // Different value: scores for the pair go
        let updated = GlobalStats {
            avg_incidents_per_race: 4.0,
            ..Default::default()
        };
        cache.set_global_stats(pair, updated);
        assert!(cache.get_score(&key).is_none());

        let other = ScoreKey::new(2, &opportunity(11, 21), Mode::Balanced);
        let history = UserHistory {
            overall: OverallStats {
                total_races: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        cache.set_user_history(2, history);
        assert!(cache.get_score(&other).is_none());
    }

    #[test]
    fn test_scores_dropped_when_stats_arrive_without_previous_entry() {
        let cache = cache_with_scores();
        let opp = opportunity(11, 21);
        let key = ScoreKey::new(1, &opp, Mode::Balanced);
        assert!(cache.get_score(&key).is_some());

        // Scores for (11, 21) were computed without any cached stats
        cache.set_global_stats(SeriesTrackPair::new(11, 21), GlobalStats::default());
        assert!(cache.get_score(&key).is_none());
        assert!(cache.get_score(&ScoreKey::new(1, &opportunity(10, 20), Mode::Balanced)).is_some());
    }

    #[test]
    fn test_scores_dropped_when_stats_expired_before_replacement() {
        let cache = RecommendationCache::with_config(CacheConfig {
            global_stats_ttl_secs: 1,
            ..Default::default()
        });
        let pair = SeriesTrackPair::new(10, 20);
        let opp = opportunity(10, 20);
        let key = ScoreKey::new(1, &opp, Mode::Balanced);

        cache.set_global_stats(pair, GlobalStats::default());
        let score = ScoringEngine::new().score(&opp, &UserHistory::default(), Mode::Balanced);
        cache.set_score(key, score);

        std::thread::sleep(std::time::Duration::from_millis(1100));
        // Same value, but the old entry is gone
        cache.set_global_stats(pair, GlobalStats::default());
        assert!(cache.get_score(&key).is_none());
    }

    #[test]
    fn test_score_key_tracks_descriptor() {
        let opp = opportunity(10, 20);
        let base = ScoreKey::new(1, &opp, Mode::Balanced);
        assert_eq!(base, ScoreKey::new(1, &opp.clone(), Mode::Balanced));

        let mut longer = opp.clone();
        longer.race_length_minutes = 60.0;
        assert_ne!(base, ScoreKey::new(1, &longer, Mode::Balanced));

        let mut open = opp.clone();
        open.fixed_setup = false;
        assert_ne!(base, ScoreKey::new(1, &open, Mode::Balanced));

        // Global stats are covered by invalidation, not by the key
        let restated = opp.with_global_stats(GlobalStats {
            attrition_rate: 40.0,
            ..Default::default()
        });
        assert_eq!(base, ScoreKey::new(1, &restated, Mode::Balanced));
    }

    #[test]
    fn test_stats_per_key_space() {
        let cache = RecommendationCache::new();
        let pair = SeriesTrackPair::new(1, 2);
        cache.get_global_stats(&pair);
        cache.set_global_stats(pair, GlobalStats::default());
        cache.get_global_stats(&pair);

        let stats = cache.stats();
        assert_eq!(stats.global_stats.hits, 1);
        assert_eq!(stats.global_stats.misses, 1);
        assert_eq!(stats.scores.total, 0);
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle() {
        let cache = Arc::new(RecommendationCache::with_config(CacheConfig {
            sweep_interval_secs: 1,
            ..Default::default()
        }));
        let handle = cache.start_sweeper();
        cache.stop_sweeper();
        handle.await.unwrap();
    }
}
