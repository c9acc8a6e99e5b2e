//! Race Recommender Library
//!
//! Scores racing opportunities (a series at a track in a given week) for a
//! user across eight risk and reward factors, and ranks them so familiar
//! combinations surface first.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod scoring;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use aggregate::{BatchAggregator, GlobalStatsSource, UserHistorySource};
pub use cache::RecommendationCache;
pub use config::Config;
pub use error::{Error, Result};
pub use scoring::{Mode, Score, ScoringEngine};
pub use service::{RankedOpportunity, Recommender};
pub use types::{GlobalStats, Opportunity, UserHistory};
