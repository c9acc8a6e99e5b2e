//! Batch resolution of global statistics
//!
//! Given many (series, track) pairs, consult the cache once per pair and
//! fetch the misses concurrently, bounded by the batch width. A failing
//! pair falls back to default statistics without affecting its siblings.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub mod memory;
pub mod source;

pub use memory::{GlobalStatsRecord, MemoryHistorySource, MemoryStatsSource};
pub use source::{GlobalStatsSample, GlobalStatsSource, UserHistorySource};

use crate::cache::RecommendationCache;
use crate::types::{GlobalStats, SeriesTrackPair, MIN_GLOBAL_SAMPLE_RACES};

/// Configuration for batch aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum concurrent fetches against the statistics provider
    #[serde(default = "default_batch_width")]
    pub batch_width: usize,
    /// Minimum races before a global sample is trusted
    #[serde(default = "default_min_sample_races")]
    pub min_sample_races: u32,
}

fn default_batch_width() -> usize {
    10
}

fn default_min_sample_races() -> u32 {
    MIN_GLOBAL_SAMPLE_RACES
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_width: default_batch_width(),
            min_sample_races: default_min_sample_races(),
        }
    }
}

/// How a pair's statistics were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Served from cache
    Cached,
    /// Fetched from the provider with a trusted sample
    Fetched,
    /// Provider had too few races; default statistics
    Insufficient,
    /// Provider failed; default statistics
    Fallback,
}

impl FetchOutcome {
    /// Whether the stats are safe to cache
    fn is_cacheable(&self) -> bool {
        matches!(self, FetchOutcome::Fetched | FetchOutcome::Insufficient)
    }
}

/// Global statistics resolved for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub pair: SeriesTrackPair,
    pub stats: GlobalStats,
    pub outcome: FetchOutcome,
}

/// Resolves global statistics for many pairs at once
pub struct BatchAggregator {
    source: Arc<dyn GlobalStatsSource>,
    cache: Arc<RecommendationCache>,
    config: BatchConfig,
}

impl BatchAggregator {
    pub fn new(
        source: Arc<dyn GlobalStatsSource>,
        cache: Arc<RecommendationCache>,
        config: BatchConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RecommendationCache> {
        &self.cache
    }

    /// Resolve statistics for every pair, in input order
    ///
    /// Duplicate pairs share one lookup and one fetch.
    pub async fn batch_global_stats(&self, pairs: &[SeriesTrackPair]) -> Vec<PairStats> {
        let started = Instant::now();

        let mut seen = HashSet::with_capacity(pairs.len());
        let unique: Vec<SeriesTrackPair> = pairs.iter().copied().filter(|p| seen.insert(*p)).collect();

        let mut resolved: HashMap<SeriesTrackPair, (GlobalStats, FetchOutcome)> =
            HashMap::with_capacity(unique.len());
        let mut misses = Vec::new();

        for pair in unique {
            match self.cache.get_global_stats(&pair) {
                Some(stats) => {
                    resolved.insert(pair, (stats, FetchOutcome::Cached));
                }
                None => misses.push(pair),
            }
        }

        let cached = resolved.len();
        let width = self.config.batch_width.max(1);
        let fetched: Vec<PairStats> = stream::iter(misses)
            .map(|pair| self.resolve(pair))
            .buffer_unordered(width)
            .collect()
            .await;

        let mut fallbacks = 0;
        for item in fetched {
            if item.outcome.is_cacheable() {
                self.cache.set_global_stats(item.pair, item.stats.clone());
            } else {
                fallbacks += 1;
            }
            resolved.insert(item.pair, (item.stats, item.outcome));
        }

        debug!(
            requested = pairs.len(),
            unique = resolved.len(),
            cached,
            fallbacks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved global stats batch"
        );

        pairs
            .iter()
            .map(|pair| {
                let (stats, outcome) = resolved
                    .get(pair)
                    .cloned()
                    .unwrap_or_else(|| (GlobalStats::default(), FetchOutcome::Fallback));
                PairStats {
                    pair: *pair,
                    stats,
                    outcome,
                }
            })
            .collect()
    }

    /// Resolve statistics for a single pair
    pub async fn global_stats(&self, pair: SeriesTrackPair) -> PairStats {
        self.batch_global_stats(&[pair])
            .await
            .pop()
            .unwrap_or_else(|| PairStats {
                pair,
                stats: GlobalStats::default(),
                outcome: FetchOutcome::Fallback,
            })
    }

    /// Fetch one pair from the provider, never failing
    async fn resolve(&self, pair: SeriesTrackPair) -> PairStats {
        let (stats, outcome) = match self.source.fetch_global_stats(pair).await {
            Ok(Some(sample)) => {
                let race_count = sample.race_count;
                match sample.into_global_stats(self.config.min_sample_races) {
                    Some(stats) => (stats, FetchOutcome::Fetched),
                    None => {
                        debug!(
                            pair = %pair,
                            race_count,
                            min = self.config.min_sample_races,
                            "Insufficient global sample, using defaults"
                        );
                        let stats = GlobalStats {
                            race_count,
                            ..Default::default()
                        };
                        (stats, FetchOutcome::Insufficient)
                    }
                }
            }
            Ok(None) => {
                debug!(pair = %pair, "No global stats recorded, using defaults");
                (GlobalStats::default(), FetchOutcome::Insufficient)
            }
            Err(e) => {
                warn!(
                    pair = %pair,
                    source = self.source.name(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "Global stats fetch failed, using defaults"
                );
                (GlobalStats::default(), FetchOutcome::Fallback)
            }
        };

        PairStats {
            pair,
            stats,
            outcome,
        }
    }
}
