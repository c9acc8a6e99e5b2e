//! Recommendation service
//!
//! Loads a user's history, resolves global statistics for every candidate
//! in one batch, scores each opportunity and orders the result so familiar
//! combinations come first.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::aggregate::{BatchAggregator, FetchOutcome, UserHistorySource};
use crate::cache::{RecommendationCache, ScoreKey};
use crate::error::{Error, Result};
use crate::scoring::{rank_by_priority, Mode, Score, ScoringEngine};
use crate::types::{Opportunity, SeriesTrackPair, UserHistory};

/// A scored opportunity, ready for display
#[derive(Debug, Clone, Serialize)]
pub struct RankedOpportunity {
    pub opportunity: Opportunity,
    pub score: Score,
    /// How the global statistics were obtained
    pub stats_outcome: FetchOutcome,
}

/// Ties the statistics sources, cache and scoring engine together
pub struct Recommender {
    engine: ScoringEngine,
    aggregator: BatchAggregator,
    history_source: Arc<dyn UserHistorySource>,
    cache: Arc<RecommendationCache>,
}

impl Recommender {
    pub fn new(
        engine: ScoringEngine,
        aggregator: BatchAggregator,
        history_source: Arc<dyn UserHistorySource>,
    ) -> Self {
        let cache = aggregator.cache().clone();
        Self {
            engine,
            aggregator,
            history_source,
            cache,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<RecommendationCache> {
        &self.cache
    }

    /// Load a user's history, from cache when possible
    pub async fn user_history(&self, user_id: u64) -> Result<UserHistory> {
        if let Some(history) = self.cache.get_user_history(user_id) {
            return Ok(history);
        }

        let history = self
            .history_source
            .fetch_user_history(user_id)
            .await
            .map_err(|e| match e {
                Error::UserHistory { .. } => e,
                other => Error::UserHistory {
                    user_id,
                    reason: other.to_string(),
                },
            })?;

        debug!(
            user_id,
            series_tracks = history.series_track.len(),
            total_races = history.overall.total_races,
            source = self.history_source.name(),
            "Fetched user history"
        );
        self.cache.set_user_history(user_id, history.clone());
        Ok(history)
    }

    /// Score and rank opportunities for a user
    ///
    /// Each opportunity's global statistics are replaced by the batch-resolved
    /// snapshot before scoring.
    pub async fn recommend(
        &self,
        user_id: u64,
        opportunities: Vec<Opportunity>,
        mode: Mode,
    ) -> Result<Vec<RankedOpportunity>> {
        let started = Instant::now();
        let history = self.user_history(user_id).await?;

        let pairs: Vec<SeriesTrackPair> = opportunities.iter().map(Opportunity::pair).collect();
        let resolved = self.aggregator.batch_global_stats(&pairs).await;

        let mut score_hits = 0;
        let mut ranked: Vec<RankedOpportunity> = opportunities
            .into_iter()
            .zip(resolved)
            .map(|(opportunity, pair_stats)| {
                let opportunity = opportunity.with_global_stats(pair_stats.stats);
                let key = ScoreKey::new(user_id, &opportunity, mode);
                let score = match self.cache.get_score(&key) {
                    Some(score) => {
                        score_hits += 1;
                        score
                    }
                    None => {
                        let score = self.engine.score(&opportunity, &history, mode);
                        // Fallback stats are not cached, so neither is a score built on them
                        if pair_stats.outcome != FetchOutcome::Fallback {
                            self.cache.set_score(key, score.clone());
                        }
                        score
                    }
                };
                RankedOpportunity {
                    opportunity,
                    score,
                    stats_outcome: pair_stats.outcome,
                }
            })
            .collect();

        rank_by_priority(&mut ranked, |r| &r.score);

        info!(
            user_id,
            mode = %mode,
            opportunities = ranked.len(),
            score_cache_hits = score_hits,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ranked opportunities"
        );

        Ok(ranked)
    }
}
