//! CLI command implementations
//!
//! Commands read JSON exports from disk and print JSON results, so the
//! scoring pipeline can be exercised without a database.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregate::{BatchAggregator, GlobalStatsRecord, MemoryHistorySource, MemoryStatsSource};
use crate::cache::RecommendationCache;
use crate::config::Config;
use crate::scoring::{Mode, Score, ScoringEngine};
use crate::service::{RankedOpportunity, Recommender};
use crate::types::{Opportunity, UserHistory};

/// User id the offline history is registered under
const OFFLINE_USER_ID: u64 = 0;

/// Read and parse a JSON file
fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn engine(config: &Config) -> Result<ScoringEngine> {
    ScoringEngine::with_weights(config.scoring.weights.clone()).context("Invalid scoring weights")
}

/// Score one opportunity against a user history
pub fn score_opportunity(
    config: &Config,
    opportunity_path: &Path,
    history_path: &Path,
    mode: Option<Mode>,
) -> Result<Score> {
    let opportunity: Opportunity = load_json(opportunity_path)?;
    let history: UserHistory = load_json(history_path)?;
    let mode = mode.unwrap_or(config.scoring.default_mode);

    debug!(
        series_id = opportunity.series_id,
        track_id = opportunity.track_id,
        mode = %mode,
        "Scoring single opportunity"
    );
    Ok(engine(config)?.score(&opportunity, &history, mode))
}

/// Rank a list of opportunities through the full recommender
///
/// Global statistics come from `stats_path` when given, otherwise from the
/// snapshots embedded in the opportunities.
pub async fn rank_opportunities(
    config: &Config,
    opportunities_path: &Path,
    history_path: &Path,
    stats_path: Option<&Path>,
    mode: Option<Mode>,
    limit: Option<usize>,
) -> Result<Vec<RankedOpportunity>> {
    let opportunities: Vec<Opportunity> = load_json(opportunities_path)?;
    let history: UserHistory = load_json(history_path)?;
    let mode = mode.unwrap_or(config.scoring.default_mode);

    let stats_source = match stats_path {
        Some(path) => {
            let records: Vec<GlobalStatsRecord> = load_json(path)?;
            MemoryStatsSource::from_records(records)
        }
        None => MemoryStatsSource::from_opportunities(&opportunities),
    };
    info!(
        opportunities = opportunities.len(),
        stats_records = stats_source.len(),
        mode = %mode,
        "Ranking opportunities"
    );

    let cache = Arc::new(RecommendationCache::with_config(config.cache.clone()));
    let aggregator = BatchAggregator::new(Arc::new(stats_source), cache, config.batch.clone());
    let histories = MemoryHistorySource::new().with_user(OFFLINE_USER_ID, history);
    let recommender = Recommender::new(engine(config)?, aggregator, Arc::new(histories));

    let mut ranked = recommender
        .recommend(OFFLINE_USER_ID, opportunities, mode)
        .await
        .context("Failed to rank opportunities")?;

    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    Ok(ranked)
}

/// Print the score for one opportunity
pub fn score(
    config: &Config,
    opportunity_path: &Path,
    history_path: &Path,
    mode: Option<Mode>,
) -> Result<()> {
    let score = score_opportunity(config, opportunity_path, history_path, mode)?;
    print_json(&score)
}

/// Print ranked opportunities
pub async fn rank(
    config: &Config,
    opportunities_path: &Path,
    history_path: &Path,
    stats_path: Option<&Path>,
    mode: Option<Mode>,
    limit: Option<usize>,
) -> Result<()> {
    let ranked =
        rank_opportunities(config, opportunities_path, history_path, stats_path, mode, limit)
            .await?;
    print_json(&ranked)
}

/// Print the effective weight table
pub fn show_weights(config: &Config) -> Result<()> {
    print_json(&config.scoring.weights)
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const OPPORTUNITIES: &str = r#"[
        {
            "series_id": 1, "series_name": "Rookie Mazda", "track_id": 10,
            "track_name": "Summit Point", "license_level": "rookie",
            "category": "sports_car", "season_year": 2026, "season_quarter": 4,
            "race_week": 1, "race_length_minutes": 20.0, "fixed_setup": true,
            "global_stats": {
                "avg_incidents_per_race": 3.5, "avg_position_std_dev": 6.0,
                "avg_strength_of_field": 1200.0, "strength_of_field_std_dev": 200.0,
                "attrition_rate": 10.0, "avg_race_length_minutes": 20.0,
                "race_count": 60, "data_quality": "high"
            }
        },
        {
            "series_id": 2, "series_name": "Ferrari GT3 Challenge", "track_id": 20,
            "track_name": "Spa", "license_level": "b", "category": "sports_car",
            "season_year": 2026, "season_quarter": 4, "race_week": 1,
            "race_length_minutes": 60.0, "fixed_setup": false
        }
    ]"#;

    const HISTORY: &str = r#"{
        "series_track": [{
            "series_id": 1, "track_id": 10, "race_count": 12,
            "avg_start_position": 8.0, "avg_finish_position": 6.0,
            "avg_position_delta": 2.0, "avg_incidents": 2.0,
            "finish_position_std_dev": 2.5
        }],
        "overall": {
            "total_races": 40, "avg_incidents_per_race": 3.0,
            "avg_position_delta": 1.0, "consistency": 4.0
        }
    }"#;

    #[test]
    fn test_score_opportunity_from_files() {
        let opportunity = json_file(
            r#"{
                "series_id": 1, "series_name": "Rookie Mazda", "track_id": 10,
                "track_name": "Summit Point", "license_level": "rookie",
                "category": "sports_car", "season_year": 2026, "season_quarter": 4,
                "race_week": 1, "race_length_minutes": 20.0, "fixed_setup": true
            }"#,
        );
        let history = json_file(HISTORY);

        let score = score_opportunity(
            &Config::default(),
            opportunity.path(),
            history.path(),
            Some(Mode::SafetyRecovery),
        )
        .unwrap();
        assert_eq!(score.mode, Mode::SafetyRecovery);
        assert!(score.overall <= 100);
        assert_eq!(score.factors.familiarity, 100);
    }

    #[test]
    fn test_score_uses_configured_default_mode() {
        let opportunities: Vec<Opportunity> = serde_json::from_str(OPPORTUNITIES).unwrap();
        let opportunity = json_file(&serde_json::to_string(&opportunities[1]).unwrap());
        let history = json_file("{}");

        let mut config = Config::default();
        config.scoring.default_mode = Mode::IratingPush;
        let score = score_opportunity(&config, opportunity.path(), history.path(), None).unwrap();
        assert_eq!(score.mode, Mode::IratingPush);
    }

    #[test]
    fn test_malformed_input_reports_path() {
        let bad = json_file("{ not json");
        let history = json_file(HISTORY);
        let err = score_opportunity(&Config::default(), bad.path(), history.path(), None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_rank_from_embedded_stats() {
        let opportunities = json_file(OPPORTUNITIES);
        let history = json_file(HISTORY);

        let ranked = rank_opportunities(
            &Config::default(),
            opportunities.path(),
            history.path(),
            None,
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].opportunity.series_id, 1);
        assert_eq!(ranked[0].opportunity.global_stats.race_count, 60);
        assert!(ranked[1].opportunity.global_stats.is_default());
    }

    #[tokio::test]
    async fn test_rank_with_stats_file_and_limit() {
        let opportunities = json_file(OPPORTUNITIES);
        let history = json_file(HISTORY);
        let stats = json_file(
            r#"[{
                "series_id": 2, "track_id": 20, "race_count": 200,
                "avg_incidents_per_race": 5.0, "avg_position_std_dev": 9.0,
                "avg_strength_of_field": 2500.0, "strength_of_field_std_dev": 500.0,
                "attrition_rate": 20.0, "avg_race_length_minutes": 60.0
            }]"#,
        );

        let ranked = rank_opportunities(
            &Config::default(),
            opportunities.path(),
            history.path(),
            Some(stats.path()),
            Some(Mode::Balanced),
            Some(5),
        )
        .await
        .unwrap();

        let gt3 = ranked.iter().find(|r| r.opportunity.series_id == 2).unwrap();
        assert_eq!(gt3.opportunity.global_stats.race_count, 200);

        let limited = rank_opportunities(
            &Config::default(),
            opportunities.path(),
            history.path(),
            Some(stats.path()),
            None,
            Some(1),
        )
        .await
        .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
