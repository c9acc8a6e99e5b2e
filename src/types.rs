//! Shared data structures for the scoring engine
//!
//! Opportunities and user histories are built by the statistics provider
//! and are read-only for the lifetime of a scoring call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum global sample before non-default statistics are trusted
pub const MIN_GLOBAL_SAMPLE_RACES: u32 = 10;

/// Sample size at which global statistics are graded `high`
pub const HIGH_QUALITY_SAMPLE_RACES: u32 = 50;

/// Replace NaN/Infinity with a documented default
pub(crate) fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// Racing discipline a series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Oval,
    SportsCar,
    FormulaCar,
    DirtOval,
    DirtRoad,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Oval => "oval",
            Category::SportsCar => "sports_car",
            Category::FormulaCar => "formula_car",
            Category::DirtOval => "dirt_oval",
            Category::DirtRoad => "dirt_road",
        };
        f.write_str(name)
    }
}

/// License tier, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseLevel {
    Rookie,
    D,
    C,
    B,
    A,
    Pro,
}

impl LicenseLevel {
    /// Expected position adjustment when no usable history exists
    pub fn position_adjustment(&self) -> f64 {
        match self {
            LicenseLevel::Rookie => -2.0,
            LicenseLevel::D => -1.0,
            LicenseLevel::C => 0.0,
            LicenseLevel::B => 1.0,
            LicenseLevel::A => 2.0,
            LicenseLevel::Pro => 3.0,
        }
    }
}

/// Quality grade of a global statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Large sample (50+ races)
    High,
    /// Trusted sample below the high-quality threshold
    Moderate,
    /// Fallback numbers, no trusted sample
    Default,
}

impl DataQuality {
    /// Grade a sample by the number of races it aggregates
    pub fn from_sample(race_count: u32) -> Self {
        if race_count >= HIGH_QUALITY_SAMPLE_RACES {
            DataQuality::High
        } else if race_count >= MIN_GLOBAL_SAMPLE_RACES {
            DataQuality::Moderate
        } else {
            DataQuality::Default
        }
    }
}

/// Aggregated statistics for one (series, track) pair across all drivers
///
/// Missing fields deserialize to the neutral defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalStats {
    pub avg_incidents_per_race: f64,
    /// Average standard deviation of finishing positions
    pub avg_position_std_dev: f64,
    pub avg_strength_of_field: f64,
    pub strength_of_field_std_dev: f64,
    /// Percentage of starters that do not finish (0-100)
    pub attrition_rate: f64,
    pub avg_race_length_minutes: f64,
    pub race_count: u32,
    pub data_quality: DataQuality,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            avg_incidents_per_race: 2.5,
            avg_position_std_dev: 8.0,
            avg_strength_of_field: 1500.0,
            strength_of_field_std_dev: 300.0,
            attrition_rate: 15.0,
            avg_race_length_minutes: 30.0,
            race_count: 0,
            data_quality: DataQuality::Default,
        }
    }
}

impl GlobalStats {
    /// Replace any non-finite field with its default value
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            avg_incidents_per_race: finite_or(self.avg_incidents_per_race, d.avg_incidents_per_race),
            avg_position_std_dev: finite_or(self.avg_position_std_dev, d.avg_position_std_dev),
            avg_strength_of_field: finite_or(self.avg_strength_of_field, d.avg_strength_of_field),
            strength_of_field_std_dev: finite_or(
                self.strength_of_field_std_dev,
                d.strength_of_field_std_dev,
            ),
            attrition_rate: finite_or(self.attrition_rate, d.attrition_rate),
            avg_race_length_minutes: finite_or(
                self.avg_race_length_minutes,
                d.avg_race_length_minutes,
            ),
            ..self
        }
    }

    /// Whether these numbers come from a trusted sample
    pub fn is_default(&self) -> bool {
        self.data_quality == DataQuality::Default
    }
}

/// A recurring session slot for an opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Hour of day (0-23, UTC)
    pub hour: u8,
    /// Day of week (0 = Sunday, 6 = Saturday)
    pub day_of_week: u8,
    pub strength_of_field: f64,
    pub participants: u32,
}

/// Identity of a (series, track) combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesTrackPair {
    pub series_id: u32,
    pub track_id: u32,
}

impl SeriesTrackPair {
    pub fn new(series_id: u32, track_id: u32) -> Self {
        Self { series_id, track_id }
    }
}

impl fmt::Display for SeriesTrackPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.series_id, self.track_id)
    }
}

/// A racing event slot: one series at one track in one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub series_id: u32,
    pub series_name: String,
    pub track_id: u32,
    pub track_name: String,
    pub license_level: LicenseLevel,
    pub category: Category,
    pub season_year: u16,
    pub season_quarter: u8,
    pub race_week: u8,
    pub race_length_minutes: f64,
    /// False when the series runs an open setup
    pub fixed_setup: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub global_stats: GlobalStats,
}

impl Opportunity {
    pub fn pair(&self) -> SeriesTrackPair {
        SeriesTrackPair::new(self.series_id, self.track_id)
    }

    /// Replace the global statistics snapshot
    pub fn with_global_stats(mut self, stats: GlobalStats) -> Self {
        self.global_stats = stats;
        self
    }
}

/// A user's aggregated record for one (series, track) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTrackHistory {
    pub series_id: u32,
    pub track_id: u32,
    pub race_count: u32,
    pub avg_start_position: f64,
    pub avg_finish_position: f64,
    /// Positions gained on average (start minus finish)
    pub avg_position_delta: f64,
    pub avg_incidents: f64,
    pub finish_position_std_dev: f64,
    #[serde(default)]
    pub last_race_at: Option<DateTime<Utc>>,
}

/// Aggregate across every series the user has raced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_races: u32,
    pub avg_incidents_per_race: f64,
    pub avg_position_delta: f64,
    /// Finishing-position standard deviation across all races
    pub consistency: f64,
}

/// License state for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseClass {
    pub category: Category,
    pub level: LicenseLevel,
    pub safety_rating: f64,
    pub irating: f64,
}

/// Everything known about a user when scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    #[serde(default)]
    pub series_track: Vec<SeriesTrackHistory>,
    #[serde(default)]
    pub overall: OverallStats,
    #[serde(default)]
    pub licenses: Vec<LicenseClass>,
}

impl UserHistory {
    /// Personal record for the exact (series, track) pair
    pub fn exact(&self, pair: SeriesTrackPair) -> Option<&SeriesTrackHistory> {
        self.series_track
            .iter()
            .find(|h| h.series_id == pair.series_id && h.track_id == pair.track_id)
    }

    /// Races at the exact pair (0 when absent)
    pub fn exact_races(&self, pair: SeriesTrackPair) -> u32 {
        self.exact(pair).map(|h| h.race_count).unwrap_or(0)
    }

    /// Races in the series across every track
    pub fn series_races(&self, series_id: u32) -> u32 {
        self.series_track
            .iter()
            .filter(|h| h.series_id == series_id)
            .map(|h| h.race_count)
            .sum()
    }

    /// Races at the track across every series
    pub fn track_races(&self, track_id: u32) -> u32 {
        self.series_track
            .iter()
            .filter(|h| h.track_id == track_id)
            .map(|h| h.race_count)
            .sum()
    }

    /// License held in a category, if any
    pub fn license(&self, category: Category) -> Option<&LicenseClass> {
        self.licenses.iter().find(|l| l.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(series_id: u32, track_id: u32, race_count: u32) -> SeriesTrackHistory {
        SeriesTrackHistory {
            series_id,
            track_id,
            race_count,
            avg_start_position: 10.0,
            avg_finish_position: 8.0,
            avg_position_delta: 2.0,
            avg_incidents: 2.0,
            finish_position_std_dev: 4.0,
            last_race_at: None,
        }
    }

    #[test]
    fn test_history_lookups() {
        let history = UserHistory {
            series_track: vec![record(100, 50, 4), record(100, 51, 6), record(200, 50, 3)],
            ..Default::default()
        };

        assert_eq!(history.exact_races(SeriesTrackPair::new(100, 50)), 4);
        assert_eq!(history.exact_races(SeriesTrackPair::new(300, 50)), 0);
        assert_eq!(history.series_races(100), 10);
        assert_eq!(history.track_races(50), 7);
        assert!(history.license(Category::Oval).is_none());
    }

    #[test]
    fn test_data_quality_grading() {
        assert_eq!(DataQuality::from_sample(0), DataQuality::Default);
        assert_eq!(DataQuality::from_sample(9), DataQuality::Default);
        assert_eq!(DataQuality::from_sample(10), DataQuality::Moderate);
        assert_eq!(DataQuality::from_sample(50), DataQuality::High);
    }

    #[test]
    fn test_global_stats_sanitized() {
        let stats = GlobalStats {
            avg_incidents_per_race: f64::NAN,
            attrition_rate: f64::INFINITY,
            avg_strength_of_field: 2100.0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(stats.avg_incidents_per_race, 2.5);
        assert_eq!(stats.attrition_rate, 15.0);
        assert_eq!(stats.avg_strength_of_field, 2100.0);
    }

    #[test]
    fn test_license_adjustment_range() {
        assert_eq!(LicenseLevel::Rookie.position_adjustment(), -2.0);
        assert_eq!(LicenseLevel::Pro.position_adjustment(), 3.0);
        assert!(LicenseLevel::A > LicenseLevel::C);
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::SportsCar).unwrap();
        assert_eq!(json, r#""sports_car""#);
        let parsed: Category = serde_json::from_str(r#""dirt_oval""#).unwrap();
        assert_eq!(parsed, Category::DirtOval);
    }
}
