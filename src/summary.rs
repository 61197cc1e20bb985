//! Night summary construction
//!
//! Orchestrates stage aggregation and heart-rate reduction for one window and
//! assembles an immutable `NightSummary`. The heart-rate window is always the
//! resolved sleep period, never the query window, so heart-rate statistics
//! reflect sleep rather than time in bed.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::error::ComputeError;
use crate::heart_rate::{HeartRateReading, HeartRateReducer};
use crate::provider::SleepDataProvider;
use crate::stages::{MarkerPolicy, StageAggregate, StageAggregator};
use crate::types::{
    seconds_between, HeartRatePoint, NightSummary, QualityFlag, StageSample, TimeWindow,
};

/// Builder for nightly summaries
#[derive(Debug, Clone, Copy, Default)]
pub struct NightSummaryBuilder {
    aggregator: StageAggregator,
}

impl NightSummaryBuilder {
    pub fn new(policy: MarkerPolicy) -> Self {
        Self {
            aggregator: StageAggregator::new(policy),
        }
    }

    /// Build the summary for `window` from the provider.
    ///
    /// Stage-query failures and `NoData` propagate unchanged; heart-rate failures
    /// degrade to zeroed statistics.
    pub async fn build<P>(
        &self,
        provider: &P,
        window: TimeWindow,
    ) -> Result<NightSummary, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        let samples = provider.fetch_stage_samples(window).await?;
        let aggregate = self.aggregator.aggregate(&samples)?;

        let heart_rate = match sleep_period(&aggregate) {
            Some(period) => {
                HeartRateReducer::from_provider(provider.fetch_heart_rate(period).await, &period)
            }
            None => HeartRateReading::NoSamples,
        };

        debug!(
            "built summary for window starting {} ({} samples)",
            window.start.to_rfc3339(),
            samples.len()
        );
        Ok(Self::assemble(&aggregate, &heart_rate))
    }

    /// Build the summary for the 24 hours ending at `now`
    pub async fn build_last_night<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<NightSummary, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        self.build(provider, TimeWindow::last_24_hours(now)).await
    }

    /// Summarize already-fetched samples without a provider
    pub fn summarize(
        &self,
        samples: &[StageSample],
        heart_rate: &[HeartRatePoint],
    ) -> Result<NightSummary, ComputeError> {
        let aggregate = self.aggregator.aggregate(samples)?;
        let reading = match sleep_period(&aggregate) {
            Some(period) => HeartRateReducer::reduce(heart_rate, &period),
            None => HeartRateReading::NoSamples,
        };
        Ok(Self::assemble(&aggregate, &reading))
    }

    /// Combine the two reductions into a summary
    pub fn assemble(aggregate: &StageAggregate, heart_rate: &HeartRateReading) -> NightSummary {
        let period_secs = seconds_between(aggregate.sleep_start, aggregate.sleep_end);
        let duration_secs = period_secs - aggregate.time_awake_secs;

        let mut quality_flags = Vec::new();
        if duration_secs < 0.0 {
            warn!(
                "negative sleep duration ({duration_secs}s) for night starting {}",
                aggregate.sleep_start.to_rfc3339()
            );
            quality_flags.push(QualityFlag::NegativeDuration);
        }
        if !heart_rate.is_measured() {
            quality_flags.push(QualityFlag::MissingHeartRate);
        }
        if aggregate.marker_out_of_order {
            quality_flags.push(QualityFlag::MarkerOutOfOrder);
        }
        if aggregate.unknown_stage_count > 0 {
            quality_flags.push(QualityFlag::UnknownStages);
        }

        let stats = heart_rate.stats();

        NightSummary {
            start_time: aggregate.sleep_start,
            end_time: aggregate.sleep_end,
            duration_secs,
            time_awake_secs: aggregate.time_awake_secs,
            time_rem_secs: aggregate.time_rem_secs,
            time_core_secs: aggregate.time_core_secs,
            time_deep_secs: aggregate.time_deep_secs,
            interruptions_count: aggregate.interruptions_count,
            sleep_onset_latency_secs: aggregate.sleep_onset_latency_secs,
            heart_rate_min: stats.min,
            heart_rate_max: stats.max,
            heart_rate_avg: stats.avg,
            quality_flags,
        }
    }
}

/// The resolved sleep period, if it has positive length
fn sleep_period(aggregate: &StageAggregate) -> Option<TimeWindow> {
    TimeWindow::new(aggregate.sleep_start, aggregate.sleep_end).ok()
}
