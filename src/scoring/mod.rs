//! Scoring engine for ranking race opportunities
//!
//! The engine turns one opportunity and one user's history into a
//! deterministic [`Score`]: eight factor scores, a mode-weighted overall
//! score, risk levels, a priority used for ordering, and reasoning strings.
//! It performs no I/O and holds no mutable state.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::trace;

pub mod confidence;
pub mod factors;
pub mod weights;

pub use confidence::{confidence_level, Confidence, DataConfidence};
pub use weights::{FactorWeights, Mode, WeightTable};

use crate::error::Result;
use crate::types::{Opportunity, UserHistory};

/// Risk exposure for iRating or safety rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify from two factor scores where low values mean risk
    fn from_factors(primary: u8, secondary: u8) -> Self {
        if primary < 40 || secondary < 30 {
            RiskLevel::High
        } else if primary < 60 || secondary < 60 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// The eight factor scores, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScores {
    pub performance: u8,
    pub safety: u8,
    pub consistency: u8,
    pub predictability: u8,
    pub familiarity: u8,
    /// Higher = lower fatigue
    pub fatigue_risk: u8,
    /// Higher = lower attrition
    pub attrition_risk: u8,
    /// Higher = more stable
    pub time_volatility: u8,
}

impl FactorScores {
    /// Factors in the same order as [`FactorWeights::as_array`]
    pub fn as_array(&self) -> [u8; 8] {
        [
            self.performance,
            self.safety,
            self.consistency,
            self.predictability,
            self.familiarity,
            self.fatigue_risk,
            self.attrition_risk,
            self.time_volatility,
        ]
    }

    /// Weighted combination, rounded to the nearest integer
    pub fn weighted(&self, weights: &FactorWeights) -> u8 {
        let total: f64 = self
            .as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(factor, weight)| *factor as f64 * weight)
            .sum();
        to_score(total)
    }
}

/// Scoring result for one opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Overall score (0-100) under the requested mode
    pub overall: u8,
    pub factors: FactorScores,
    pub irating_risk: RiskLevel,
    pub safety_risk: RiskLevel,
    pub data_confidence: DataConfidence,
    /// Ordering bias toward familiar content (0-100), not for display
    pub priority_score: u8,
    pub reasoning: Vec<String>,
    pub mode: Mode,
}

/// Round and clamp a raw factor value to an integer score
fn to_score(value: f64) -> u8 {
    if !value.is_finite() {
        return factors::NEUTRAL_SCORE as u8;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// The main scoring engine
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: WeightTable,
}

impl ScoringEngine {
    /// Create a new scoring engine with default weights
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom weight table (validated)
    pub fn with_weights(weights: WeightTable) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Compute the mode-independent factor scores
    pub fn factor_scores(&self, opportunity: &Opportunity, history: &UserHistory) -> FactorScores {
        FactorScores {
            performance: to_score(factors::performance_score(opportunity, history)),
            safety: to_score(factors::safety_score(opportunity, history)),
            consistency: to_score(factors::consistency_score(opportunity, history)),
            predictability: to_score(factors::predictability_score(opportunity, history)),
            familiarity: to_score(factors::familiarity_score(opportunity, history)),
            fatigue_risk: to_score(factors::fatigue_score(opportunity)),
            attrition_risk: to_score(factors::attrition_score(opportunity)),
            time_volatility: to_score(factors::time_volatility_score(opportunity)),
        }
    }

    /// Score one opportunity for one user under a mode
    pub fn score(&self, opportunity: &Opportunity, history: &UserHistory, mode: Mode) -> Score {
        let factor_scores = self.factor_scores(opportunity, history);
        let overall = factor_scores.weighted(self.weights.weights(mode));

        let pair = opportunity.pair();
        let exact_races = history.exact_races(pair);
        let data_confidence = DataConfidence::evaluate(
            factors::expected_performance(opportunity, history).data_confidence,
            exact_races,
            history.overall.total_races,
            opportunity.global_stats.data_quality,
        );

        let priority_score = priority_score(
            exact_races,
            history.series_races(opportunity.series_id),
            history.track_races(opportunity.track_id),
            &data_confidence,
        );

        let score = Score {
            overall,
            irating_risk: RiskLevel::from_factors(
                factor_scores.performance,
                factor_scores.predictability,
            ),
            safety_risk: RiskLevel::from_factors(factor_scores.safety, factor_scores.attrition_risk),
            reasoning: reasoning(&factor_scores, opportunity),
            factors: factor_scores,
            data_confidence,
            priority_score,
            mode,
        };

        trace!(
            series_id = opportunity.series_id,
            track_id = opportunity.track_id,
            mode = %mode,
            overall = score.overall,
            priority = score.priority_score,
            "Scored opportunity"
        );

        score
    }
}

/// Priority used to bias ordering toward familiar combinations
pub fn priority_score(
    exact_races: u32,
    series_races: u32,
    track_races: u32,
    confidence: &DataConfidence,
) -> u8 {
    let mut priority: u32 = 50;

    if confidence_level(exact_races).is_high() {
        priority += 30;
    }
    if confidence.performance.is_high() {
        priority += 10;
    }
    if confidence.safety.is_high() {
        priority += 5;
    }
    if confidence.consistency.is_high() {
        priority += 5;
    }

    priority += match series_races {
        n if n >= 10 => 15,
        n if n >= 5 => 10,
        _ => 0,
    };
    priority += match track_races {
        n if n >= 10 => 10,
        n if n >= 5 => 5,
        _ => 0,
    };

    priority.min(100) as u8
}

/// Human-readable reasons, in evaluation order
fn reasoning(factors: &FactorScores, opportunity: &Opportunity) -> Vec<String> {
    let mut reasons = Vec::new();

    if factors.performance >= 70 {
        reasons.push("Strong expected finishing performance for this combination".to_string());
    } else if factors.performance <= 30 {
        reasons.push("Gaining positions here has historically been difficult".to_string());
    }

    if factors.safety >= 70 {
        reasons.push("Low expected incident exposure".to_string());
    } else if factors.safety <= 30 {
        reasons.push("High incident risk expected".to_string());
    }

    if factors.familiarity >= 70 {
        reasons.push(format!(
            "Familiar with {} at {}",
            opportunity.series_name, opportunity.track_name
        ));
    } else if factors.familiarity == 0 {
        reasons.push("New series and track combination".to_string());
    }

    if factors.fatigue_risk <= 30 {
        reasons.push(format!(
            "Long race ({:.0} min), plan for endurance",
            opportunity.race_length_minutes
        ));
    }

    if !opportunity.fixed_setup {
        reasons.push("Open setup: setup work required".to_string());
    }

    reasons
}

/// Order scored opportunities: priority first, then overall, stable otherwise
pub fn rank_by_priority<T>(items: &mut [T], score_of: impl Fn(&T) -> &Score) {
    items.sort_by(|a, b| {
        let (a, b) = (score_of(a), score_of(b));
        match b.priority_score.cmp(&a.priority_score) {
            Ordering::Equal => b.overall.cmp(&a.overall),
            other => other,
        }
    });
}
