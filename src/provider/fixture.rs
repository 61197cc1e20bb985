//! In-memory provider backed by a JSON fixture
//!
//! Serves recorded samples to the CLI and the FFI, and rehearses degraded paths
//! through windows that are configured to fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SleepDataProvider;
use crate::error::ComputeError;
use crate::types::{HeartRatePoint, StageSample, TimeWindow};

/// Recorded provider data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleepFixture {
    /// Stage intervals in provider order
    #[serde(default)]
    pub stage_samples: Vec<StageSample>,
    #[serde(default)]
    pub heart_rate: Vec<HeartRatePoint>,
    /// Stage queries overlapping any of these windows fail
    #[serde(default)]
    pub failing_windows: Vec<TimeWindow>,
    /// Heart-rate queries overlapping any of these windows fail
    #[serde(default)]
    pub heart_rate_failing_windows: Vec<TimeWindow>,
}

/// Provider serving a `SleepFixture`
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    fixture: SleepFixture,
}

impl FixtureProvider {
    pub fn new(fixture: SleepFixture) -> Self {
        Self { fixture }
    }

    pub fn from_samples(stage_samples: Vec<StageSample>, heart_rate: Vec<HeartRatePoint>) -> Self {
        Self::new(SleepFixture {
            stage_samples,
            heart_rate,
            ..Default::default()
        })
    }

    /// Parse a fixture from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let fixture: SleepFixture = serde_json::from_str(json)?;
        Ok(Self::new(fixture))
    }

    /// Make stage queries overlapping `window` fail
    pub fn fail_window(mut self, window: TimeWindow) -> Self {
        self.fixture.failing_windows.push(window);
        self
    }

    /// Make heart-rate queries overlapping `window` fail
    pub fn fail_heart_rate_window(mut self, window: TimeWindow) -> Self {
        self.fixture.heart_rate_failing_windows.push(window);
        self
    }

    pub fn fixture(&self) -> &SleepFixture {
        &self.fixture
    }

    fn check_failure(failing: &[TimeWindow], window: &TimeWindow) -> Result<(), ComputeError> {
        match failing.iter().find(|f| f.overlaps(window)) {
            Some(f) => Err(ComputeError::ProviderFailure(format!(
                "fixture window {} - {} is configured to fail",
                f.start.to_rfc3339(),
                f.end.to_rfc3339()
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SleepDataProvider for FixtureProvider {
    /// Samples whose start lies in the window, in recorded order
    async fn fetch_stage_samples(
        &self,
        window: TimeWindow,
    ) -> Result<Vec<StageSample>, ComputeError> {
        Self::check_failure(&self.fixture.failing_windows, &window)?;
        Ok(self
            .fixture
            .stage_samples
            .iter()
            .filter(|s| window.contains(s.start_time))
            .cloned()
            .collect())
    }

    async fn fetch_heart_rate(
        &self,
        window: TimeWindow,
    ) -> Result<Vec<HeartRatePoint>, ComputeError> {
        Self::check_failure(&self.fixture.heart_rate_failing_windows, &window)?;
        Ok(self
            .fixture
            .heart_rate
            .iter()
            .filter(|p| window.contains(p.timestamp))
            .cloned()
            .collect())
    }
}
