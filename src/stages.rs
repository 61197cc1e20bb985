//! Stage aggregation
//!
//! Reduces one night's sleep-stage intervals into per-stage totals, the sleep
//! period bounds, the interruption count, and the sleep onset latency.
//!
//! The leading sample is the "time in bed before sleep" marker. Its length is the
//! onset latency and it takes no part in any other total.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{SleepStage, StageSample};

/// How the leading in-bed marker is selected from a provider result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Trust provider order: the first sample returned is the marker
    #[default]
    FirstReturned,
    /// Stable-sort by start time first: the chronologically earliest sample is the marker
    EarliestStart,
}

impl MarkerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerPolicy::FirstReturned => "first_returned",
            MarkerPolicy::EarliestStart => "earliest_start",
        }
    }
}

/// Result of aggregating one night's stage samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAggregate {
    /// Start of the first in-bed sample after the marker
    pub sleep_start: DateTime<Utc>,
    /// End of the last sample in sequence order
    pub sleep_end: DateTime<Utc>,
    pub time_awake_secs: f64,
    pub time_rem_secs: f64,
    pub time_core_secs: f64,
    pub time_deep_secs: f64,
    pub interruptions_count: u32,
    pub sleep_onset_latency_secs: f64,
    /// A sample started before the marker (only detectable under `FirstReturned`)
    pub marker_out_of_order: bool,
    /// Samples excluded from every bucket because their stage is unknown
    pub unknown_stage_count: usize,
}

/// Stage aggregator for one query window
#[derive(Debug, Clone, Copy, Default)]
pub struct StageAggregator {
    policy: MarkerPolicy,
}

impl StageAggregator {
    pub fn new(policy: MarkerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MarkerPolicy {
        self.policy
    }

    /// Aggregate the samples of one window.
    ///
    /// Fails with `NoData` when there are no samples, when only the marker is
    /// present, or when no in-bed sample follows the marker. Fails with
    /// `InvalidWindow` when any sample ends before it starts.
    pub fn aggregate(&self, samples: &[StageSample]) -> Result<StageAggregate, ComputeError> {
        if samples.is_empty() {
            return Err(ComputeError::NoData(
                "no stage samples in window".to_string(),
            ));
        }

        if let Some(bad) = samples.iter().find(|s| s.end_time < s.start_time) {
            return Err(ComputeError::InvalidWindow(format!(
                "stage sample ends ({}) before it starts ({})",
                bad.end_time.to_rfc3339(),
                bad.start_time.to_rfc3339()
            )));
        }

        let ordered: Cow<'_, [StageSample]> = match self.policy {
            MarkerPolicy::FirstReturned => Cow::Borrowed(samples),
            MarkerPolicy::EarliestStart => {
                let mut sorted = samples.to_vec();
                sorted.sort_by_key(|s| s.start_time);
                Cow::Owned(sorted)
            }
        };

        let (marker, rest) = match ordered.split_first() {
            Some((marker, rest)) if !rest.is_empty() => (marker, rest),
            _ => {
                return Err(ComputeError::NoData(
                    "only the in-bed marker was returned".to_string(),
                ))
            }
        };

        let marker_out_of_order = rest.iter().any(|s| s.start_time < marker.start_time);
        if marker_out_of_order {
            warn!(
                "stage samples start before the leading marker at {}; provider order may not be chronological",
                marker.start_time.to_rfc3339()
            );
        }

        let mut time_awake_secs = 0.0;
        let mut time_rem_secs = 0.0;
        let mut time_core_secs = 0.0;
        let mut time_deep_secs = 0.0;
        let mut interruptions_count = 0u32;
        let mut unknown_stage_count = 0usize;

        for sample in rest {
            let duration = sample.duration_secs();
            match sample.stage {
                SleepStage::Awake => {
                    time_awake_secs += duration;
                    interruptions_count += 1;
                }
                SleepStage::Core => time_core_secs += duration,
                SleepStage::Rem => time_rem_secs += duration,
                SleepStage::Deep => time_deep_secs += duration,
                SleepStage::InBed => {}
                SleepStage::Unknown => unknown_stage_count += 1,
            }
        }

        let sleep_start = rest
            .iter()
            .find(|s| s.stage == SleepStage::InBed)
            .map(|s| s.start_time)
            .ok_or_else(|| {
                ComputeError::NoData("no in-bed sample after the marker".to_string())
            })?;

        // Last by sequence order, not by time
        let sleep_end = rest.last().map(|s| s.end_time).unwrap_or(sleep_start);

        debug!(
            "aggregated {} stage samples ({} unknown) from {} to {}",
            rest.len(),
            unknown_stage_count,
            sleep_start.to_rfc3339(),
            sleep_end.to_rfc3339()
        );

        Ok(StageAggregate {
            sleep_start,
            sleep_end,
            time_awake_secs,
            time_rem_secs,
            time_core_secs,
            time_deep_secs,
            interruptions_count,
            sleep_onset_latency_secs: marker.duration_secs(),
            marker_out_of_order,
            unknown_stage_count,
        })
    }
}
