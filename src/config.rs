//! Engine configuration
//!
//! The host persists the user's target sleep and hands it to the engine on every
//! invocation; the engine itself never touches configuration storage.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ComputeError;
use crate::stages::MarkerPolicy;

/// Default target sleep per night in hours
pub const DEFAULT_TARGET_SLEEP_HOURS: f64 = 8.0;

/// Default trailing window for sleep debt in days
pub const DEFAULT_DEBT_WINDOW_DAYS: u32 = 14;

/// Longest accepted debt window in days
pub const MAX_DEBT_WINDOW_DAYS: u32 = 366;

/// Engine configuration supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target sleep per night (hours)
    pub target_sleep_hours: f64,
    /// Number of trailing days in the debt series
    pub debt_window_days: u32,
    /// Day queries allowed in flight at once (1 = one day at a time)
    pub max_concurrent_days: usize,
    /// Per-day provider timeout; a timed-out day is skipped
    pub day_timeout_secs: Option<u64>,
    pub marker_policy: MarkerPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_sleep_hours: DEFAULT_TARGET_SLEEP_HOURS,
            debt_window_days: DEFAULT_DEBT_WINDOW_DAYS,
            max_concurrent_days: 1,
            day_timeout_secs: None,
            marker_policy: MarkerPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with a specific target
    pub fn with_target(target_sleep_hours: f64) -> Self {
        Self {
            target_sleep_hours,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.target_sleep_hours.is_finite() || self.target_sleep_hours <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "target_sleep_hours must be a positive number, got {}",
                self.target_sleep_hours
            )));
        }
        if self.debt_window_days == 0 || self.debt_window_days > MAX_DEBT_WINDOW_DAYS {
            return Err(ComputeError::InvalidConfig(format!(
                "debt_window_days must be between 1 and {MAX_DEBT_WINDOW_DAYS}, got {}",
                self.debt_window_days
            )));
        }
        if self.max_concurrent_days == 0 {
            return Err(ComputeError::InvalidConfig(
                "max_concurrent_days must be at least 1".to_string(),
            ));
        }
        if self.day_timeout_secs == Some(0) {
            return Err(ComputeError::InvalidConfig(
                "day_timeout_secs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn day_timeout(&self) -> Option<Duration> {
        self.day_timeout_secs.map(Duration::from_secs)
    }

    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string(self)?)
    }
}
