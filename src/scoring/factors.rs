//! Factor calculations
//!
//! Each factor maps raw statistics onto a 0-100 scale where higher is
//! always better for the driver. Every function here is total: non-finite
//! inputs are replaced with neutral defaults before any arithmetic.

use crate::scoring::confidence::{
    confidence_level, confidence_level_with_threshold, Confidence, HIGH_CONSISTENCY_RACES,
};
use crate::types::{finite_or, GlobalStats, Opportunity, TimeSlot, UserHistory};

/// Midpoint used whenever a factor has nothing to say
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Expected position delta is clamped to this many positions either way
const MAX_POSITION_DELTA: f64 = 10.0;
/// Overall races required before overall delta is used as an estimate
const MIN_OVERALL_RACES_FOR_ESTIMATE: u32 = 5;
/// Positions gained per 200 points of iRating advantage over the field
const POSITIONS_PER_200_IRATING: f64 = 5.0;
const MAX_ESTIMATE_CONFIDENCE: f64 = 0.8;
const MIN_ESTIMATE_CONFIDENCE: f64 = 0.3;
const LICENSE_FALLBACK_CONFIDENCE: f64 = 0.3;

/// Incidents per race that map to a zero safety score
const MAX_INCIDENTS: f64 = 12.0;
/// Start of the extra penalty band for very high incident rates
const HIGH_INCIDENT_THRESHOLD: f64 = 8.0;
const HIGH_INCIDENT_SLOPE: f64 = 2.5;
const DEFAULT_SAFETY_RATING: f64 = 2.5;
const NEUTRAL_SAFETY_RATING: f64 = 3.0;
const MAX_PERSONAL_SAFETY_WEIGHT: f64 = 0.7;
const REFERENCE_RACE_LENGTH: f64 = 20.0;
const MIN_LENGTH_FACTOR: f64 = 0.8;
const MAX_LENGTH_FACTOR: f64 = 2.0;

const MAX_STD_DEV: f64 = 15.0;
const MAX_PERSONAL_CONSISTENCY_WEIGHT: f64 = 0.6;

const MAX_SOF_VARIABILITY: f64 = 2000.0;
const IRATING_GAP_TOLERANCE: f64 = 300.0;
const MAX_IRATING_GAP_PENALTY: f64 = 200.0;

const DEFAULT_ATTRITION_RATE: f64 = 15.0;
const MAX_ATTRITION_RATE: f64 = 50.0;

/// Expected position delta together with how much it can be trusted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceEstimate {
    pub expected_delta: f64,
    /// 0.0 (pure guess) to 1.0 (personal data)
    pub confidence: f64,
    /// Label of the data the estimate came from
    pub data_confidence: Confidence,
}

/// Estimate positions gained at this opportunity
pub fn expected_performance(opportunity: &Opportunity, history: &UserHistory) -> PerformanceEstimate {
    let pair = opportunity.pair();
    if let Some(exact) = history.exact(pair) {
        if confidence_level(exact.race_count).is_high() {
            return PerformanceEstimate {
                expected_delta: finite_or(exact.avg_position_delta, 0.0),
                confidence: 1.0,
                data_confidence: Confidence::High,
            };
        }
    }

    let overall = &history.overall;
    let license = history.license(opportunity.category);

    if let Some(license) = license.filter(|_| overall.total_races >= MIN_OVERALL_RACES_FOR_ESTIMATE) {
        let field = finite_or(
            opportunity.global_stats.avg_strength_of_field,
            GlobalStats::default().avg_strength_of_field,
        );
        let irating = finite_or(license.irating, field);
        let adjustment = (irating - field) / 200.0 * POSITIONS_PER_200_IRATING;
        let confidence = (overall.total_races as f64 / 20.0)
            .clamp(MIN_ESTIMATE_CONFIDENCE, MAX_ESTIMATE_CONFIDENCE);

        return PerformanceEstimate {
            expected_delta: finite_or(overall.avg_position_delta, 0.0) + adjustment,
            confidence,
            data_confidence: Confidence::Estimated,
        };
    }

    // No race history feeds this branch, only the license tier
    let level = license.map(|l| l.level).unwrap_or(opportunity.license_level);
    PerformanceEstimate {
        expected_delta: level.position_adjustment(),
        confidence: LICENSE_FALLBACK_CONFIDENCE,
        data_confidence: Confidence::NoData,
    }
}

/// Performance factor: expected delta scaled to 0-100, regressed toward 50
pub fn performance_score(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let estimate = expected_performance(opportunity, history);
    let delta = finite_or(estimate.expected_delta, 0.0).clamp(-MAX_POSITION_DELTA, MAX_POSITION_DELTA);
    let raw = (delta + MAX_POSITION_DELTA) / (2.0 * MAX_POSITION_DELTA) * 100.0;
    let confidence = finite_or(estimate.confidence, 0.0).clamp(0.0, 1.0);

    NEUTRAL_SCORE + (raw - NEUTRAL_SCORE) * confidence
}

/// Multiplier applied to the global incident rate for unfamiliar series
///
/// Non-decreasing in race length; non-positive lengths take the minimum.
pub fn race_length_factor(race_length_minutes: f64) -> f64 {
    if race_length_minutes.is_nan() || race_length_minutes <= 0.0 {
        return MIN_LENGTH_FACTOR;
    }
    if race_length_minutes.is_infinite() {
        return MAX_LENGTH_FACTOR;
    }
    (1.0 + (race_length_minutes / REFERENCE_RACE_LENGTH).log2() * 0.5)
        .clamp(MIN_LENGTH_FACTOR, MAX_LENGTH_FACTOR)
}

/// Expected incidents per race at this opportunity
pub fn expected_incidents(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let global_default = GlobalStats::default().avg_incidents_per_race;
    let global_rate = finite_or(opportunity.global_stats.avg_incidents_per_race, global_default).max(0.0);

    if let Some(exact) = history.exact(opportunity.pair()) {
        if confidence_level(exact.race_count).is_high() {
            // Real incident data already reflects the race length
            return finite_or(exact.avg_incidents, global_rate).max(0.0);
        }
    }

    let global_estimate = global_rate * race_length_factor(opportunity.race_length_minutes);

    let overall = &history.overall;
    if overall.total_races == 0 {
        return global_estimate;
    }

    let safety_rating = history
        .license(opportunity.category)
        .map(|l| finite_or(l.safety_rating, DEFAULT_SAFETY_RATING))
        .unwrap_or(DEFAULT_SAFETY_RATING);
    let personal_estimate = (finite_or(overall.avg_incidents_per_race, global_rate)
        + (NEUTRAL_SAFETY_RATING - safety_rating) * 0.5)
        .max(0.0);
    let weight = (overall.total_races as f64 / 10.0).min(MAX_PERSONAL_SAFETY_WEIGHT);

    personal_estimate * weight + global_estimate * (1.0 - weight)
}

/// Convert an incident rate to a safety score
pub fn incidents_to_score(incidents: f64) -> f64 {
    let incidents = finite_or(incidents, GlobalStats::default().avg_incidents_per_race).max(0.0);
    let base = (1.0 - incidents / MAX_INCIDENTS) * 100.0;
    let penalty = if incidents > HIGH_INCIDENT_THRESHOLD {
        (incidents.min(MAX_INCIDENTS) - HIGH_INCIDENT_THRESHOLD) * HIGH_INCIDENT_SLOPE
    } else {
        0.0
    };
    (base - penalty).clamp(0.0, 100.0)
}

/// Safety factor
pub fn safety_score(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    incidents_to_score(expected_incidents(opportunity, history))
}

/// Expected finishing-position standard deviation
pub fn expected_std_dev(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let global_sd = finite_or(
        opportunity.global_stats.avg_position_std_dev,
        GlobalStats::default().avg_position_std_dev,
    );
    let exact = history.exact(opportunity.pair());

    if let Some(exact) = exact {
        if confidence_level_with_threshold(exact.race_count, HIGH_CONSISTENCY_RACES).is_high() {
            return finite_or(exact.finish_position_std_dev, global_sd);
        }
    }

    let (personal_sd, count) = match exact {
        Some(e) if e.race_count > 0 => (finite_or(e.finish_position_std_dev, global_sd), e.race_count),
        _ if history.overall.total_races > 0 => (
            finite_or(history.overall.consistency, global_sd),
            history.overall.total_races,
        ),
        _ => (global_sd, 0),
    };
    let weight = (count as f64 / HIGH_CONSISTENCY_RACES as f64).min(MAX_PERSONAL_CONSISTENCY_WEIGHT);

    personal_sd * weight + global_sd * (1.0 - weight)
}

/// Consistency factor
pub fn consistency_score(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let sd = expected_std_dev(opportunity, history).clamp(0.0, MAX_STD_DEV);
    (1.0 - sd / MAX_STD_DEV) * 100.0
}

/// Predictability factor: field variability plus the driver's gap to it
pub fn predictability_score(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let defaults = GlobalStats::default();
    let stats = &opportunity.global_stats;
    let mut variability = finite_or(stats.strength_of_field_std_dev, defaults.strength_of_field_std_dev);

    if let Some(license) = history.license(opportunity.category) {
        let field = finite_or(stats.avg_strength_of_field, defaults.avg_strength_of_field);
        let gap = (finite_or(license.irating, field) - field).abs();
        if gap > IRATING_GAP_TOLERANCE {
            variability += ((gap - IRATING_GAP_TOLERANCE) / 2.0).min(MAX_IRATING_GAP_PENALTY);
        }
    }

    let variability = variability.clamp(0.0, MAX_SOF_VARIABILITY);
    (1.0 - variability / MAX_SOF_VARIABILITY) * 100.0
}

/// Step score for races at the exact combination
pub fn exact_familiarity(races: u32) -> f64 {
    match races {
        0 => 0.0,
        1 => 30.0,
        2..=4 => 30.0 + (races - 1) as f64 * 10.0,
        5..=9 => 60.0 + (races - 5) as f64 * 8.0,
        _ => 100.0,
    }
}

/// Familiarity factor from exact, same-series and same-track experience
pub fn familiarity_score(opportunity: &Opportunity, history: &UserHistory) -> f64 {
    let exact = history.exact_races(opportunity.pair());
    let series = history.series_races(opportunity.series_id);
    let track = history.track_races(opportunity.track_id);

    let series_score = (series as f64 / 20.0 * 90.0).min(90.0);
    let track_score = (track as f64 / 20.0 * 80.0).min(80.0);
    let weighted = exact_familiarity(exact) * 0.6 + series_score * 0.25 + track_score * 0.15;

    let floor = if exact >= 10 {
        80.0
    } else if exact >= 5 {
        60.0
    } else {
        0.0
    };

    weighted.max(floor).clamp(0.0, 100.0)
}

/// Fatigue factor (higher = less fatiguing)
pub fn fatigue_score(opportunity: &Opportunity) -> f64 {
    let length = opportunity.race_length_minutes;
    let base: f64 = if length.is_nan() || length <= 30.0 {
        90.0
    } else if length <= 60.0 {
        70.0
    } else if length <= 120.0 {
        50.0
    } else {
        30.0
    };
    let setup_penalty = if opportunity.fixed_setup { 0.0 } else { 15.0 };

    (base - setup_penalty).clamp(0.0, 100.0)
}

/// Attrition factor (higher = fewer retirements)
pub fn attrition_score(opportunity: &Opportunity) -> f64 {
    let rate = finite_or(opportunity.global_stats.attrition_rate, DEFAULT_ATTRITION_RATE)
        .clamp(0.0, MAX_ATTRITION_RATE);
    (1.0 - rate / MAX_ATTRITION_RATE) * 100.0
}

fn time_slot_score(slot: &TimeSlot) -> f64 {
    let hour = slot.hour % 24;
    let day = slot.day_of_week % 7;
    let mut score: f64 = 100.0;

    if hour >= 22 || hour <= 6 {
        score -= 30.0;
    }
    if (3..=7).contains(&hour) {
        score -= 20.0;
    }
    if day == 5 && hour >= 18 {
        score += 10.0;
    }
    if day == 0 || day == 6 {
        score += 15.0;
    }
    if slot.participants < 10 {
        score -= 25.0;
    }

    score.clamp(0.0, 100.0)
}

/// Time volatility factor (higher = more stable fields)
pub fn time_volatility_score(opportunity: &Opportunity) -> f64 {
    if opportunity.time_slots.is_empty() {
        return NEUTRAL_SCORE;
    }
    let total: f64 = opportunity.time_slots.iter().map(time_slot_score).sum();
    total / opportunity.time_slots.len() as f64
}
