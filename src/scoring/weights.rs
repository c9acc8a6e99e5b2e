//! Mode-dependent factor weights
//!
//! A mode is nothing more than a lookup into a weight table. Factor values
//! never depend on the mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tolerance when checking that a weight vector sums to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-5;

/// Weighting profile selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Chase iRating: performance and familiarity heavy
    IratingPush,
    /// Rebuild safety rating: safety and consistency heavy
    SafetyRecovery,
    /// Even middle profile
    #[default]
    Balanced,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::IratingPush, Mode::SafetyRecovery, Mode::Balanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::IratingPush => "irating_push",
            Mode::SafetyRecovery => "safety_recovery",
            Mode::Balanced => "balanced",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "irating_push" | "irating" => Ok(Mode::IratingPush),
            "safety_recovery" | "safety" => Ok(Mode::SafetyRecovery),
            "balanced" => Ok(Mode::Balanced),
            other => Err(Error::InvalidInput(format!("unknown mode: {}", other))),
        }
    }
}

/// One weight per factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub performance: f64,
    pub safety: f64,
    pub consistency: f64,
    pub predictability: f64,
    pub familiarity: f64,
    pub fatigue_risk: f64,
    pub attrition_risk: f64,
    pub time_volatility: f64,
}

impl FactorWeights {
    /// Weights in canonical factor order
    pub fn as_array(&self) -> [f64; 8] {
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

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Weights must be finite, non-negative and sum to 1.0
    pub fn validate(&self, mode: Mode) -> Result<()> {
        if let Some(bad) = self.as_array().iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidWeights {
                mode: mode.to_string(),
                reason: format!("weight {} is negative or not finite", bad),
            });
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidWeights {
                mode: mode.to_string(),
                reason: format!("weights sum to {:.6}, expected 1.0", sum),
            });
        }

        Ok(())
    }

    fn irating_push() -> Self {
        Self {
            performance: 0.30,
            safety: 0.10,
            consistency: 0.10,
            predictability: 0.10,
            familiarity: 0.25,
            fatigue_risk: 0.05,
            attrition_risk: 0.05,
            time_volatility: 0.05,
        }
    }

    fn safety_recovery() -> Self {
        Self {
            performance: 0.05,
            safety: 0.30,
            consistency: 0.20,
            predictability: 0.10,
            familiarity: 0.15,
            fatigue_risk: 0.05,
            attrition_risk: 0.10,
            time_volatility: 0.05,
        }
    }

    fn balanced() -> Self {
        Self {
            performance: 0.15,
            safety: 0.15,
            consistency: 0.125,
            predictability: 0.125,
            familiarity: 0.15,
            fatigue_risk: 0.10,
            attrition_risk: 0.10,
            time_volatility: 0.10,
        }
    }
}

/// Weight vectors for every mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default = "FactorWeights::irating_push")]
    pub irating_push: FactorWeights,
    #[serde(default = "FactorWeights::safety_recovery")]
    pub safety_recovery: FactorWeights,
    #[serde(default = "FactorWeights::balanced")]
    pub balanced: FactorWeights,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            irating_push: FactorWeights::irating_push(),
            safety_recovery: FactorWeights::safety_recovery(),
            balanced: FactorWeights::balanced(),
        }
    }
}

impl WeightTable {
    /// Look up the weights for a mode
    pub fn weights(&self, mode: Mode) -> &FactorWeights {
        match mode {
            Mode::IratingPush => &self.irating_push,
            Mode::SafetyRecovery => &self.safety_recovery,
            Mode::Balanced => &self.balanced,
        }
    }

    /// Validate every mode's weight vector
    pub fn validate(&self) -> Result<()> {
        for mode in Mode::ALL {
            self.weights(mode).validate(mode)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let table = WeightTable::default();
        for mode in Mode::ALL {
            let weights = table.weights(mode);
            assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE, "{}", mode);
            assert!(weights.as_array().iter().all(|w| *w >= 0.0));
        }
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_mode_emphasis() {
        let table = WeightTable::default();
        let push = table.weights(Mode::IratingPush);
        assert!(push.performance > push.safety);
        assert!(push.familiarity > push.consistency);

        let recovery = table.weights(Mode::SafetyRecovery);
        assert!(recovery.safety > recovery.performance);
        assert!(recovery.consistency > recovery.performance);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut table = WeightTable::default();
        table.balanced.performance = 0.5;
        let err = table.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidWeights { .. }));

        let mut table = WeightTable::default();
        table.irating_push.safety = -0.1;
        table.irating_push.performance = 0.5;
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("irating_push".parse::<Mode>().unwrap(), Mode::IratingPush);
        assert_eq!("Safety-Recovery".parse::<Mode>().unwrap(), Mode::SafetyRecovery);
        assert_eq!("balanced".parse::<Mode>().unwrap(), Mode::Balanced);
        assert!("aggressive".parse::<Mode>().is_err());
    }
}
