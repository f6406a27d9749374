//! Scoring configuration.

use thiserror::Error;

/// Errors from building configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Threshold '{name}' must be a finite value in [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
}

/// Cut-off points used to classify a match.
///
/// Conventionally `exact >= high >= low`, but the ordering is not enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    exact_match: f64,
    high_confidence: f64,
    low_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            exact_match: 0.95,
            high_confidence: 0.8,
            low_confidence: 0.5,
        }
    }
}

impl Thresholds {
    /// Create thresholds, rejecting values outside [0, 1].
    pub fn new(exact_match: f64, high_confidence: f64, low_confidence: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            exact_match: check("exact_match", exact_match)?,
            high_confidence: check("high_confidence", high_confidence)?,
            low_confidence: check("low_confidence", low_confidence)?,
        })
    }

    pub fn exact_match(&self) -> f64 {
        self.exact_match
    }

    pub fn high_confidence(&self) -> f64 {
        self.high_confidence
    }

    pub fn low_confidence(&self) -> f64 {
        self.low_confidence
    }
}

fn check(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
