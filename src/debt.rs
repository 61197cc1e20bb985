//! Sleep debt accumulation
//!
//! Runs the night summary builder over a trailing window of day-long windows and
//! records `target - actual` hours for every day that produced a summary. Days
//! that fail for any reason are skipped, never zero-filled, and never abort the
//! window.
//!
//! Days are independent, so up to `max_concurrent_days` queries may be in flight.
//! Results are collected in day-index order regardless of completion order.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::provider::SleepDataProvider;
use crate::summary::NightSummaryBuilder;
use crate::types::{DebtEntry, DebtSeries, NightSummary, TimeWindow};

/// Why a day is missing from the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoData,
    ProviderFailure,
    Timeout,
    /// Malformed provider data (e.g. an inverted interval)
    InvalidData,
}

impl From<&ComputeError> for SkipReason {
    fn from(error: &ComputeError) -> Self {
        match error {
            ComputeError::NoData(_) => SkipReason::NoData,
            ComputeError::Timeout { .. } => SkipReason::Timeout,
            ComputeError::InvalidWindow(_) | ComputeError::ParseError(_) => {
                SkipReason::InvalidData
            }
            _ => SkipReason::ProviderFailure,
        }
    }
}

/// A day omitted from the debt series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDay {
    pub day_index: usize,
    pub day_start: DateTime<Utc>,
    pub reason: SkipReason,
    pub message: String,
}

/// Per-day result of the accumulation
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Recorded(DebtEntry),
    Skipped(SkippedDay),
}

/// Debt series plus the days that were skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtReport {
    pub series: DebtSeries,
    pub skipped: Vec<SkippedDay>,
}

impl DebtReport {
    fn from_outcomes(outcomes: Vec<DayOutcome>) -> Self {
        let mut entries = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                DayOutcome::Recorded(entry) => entries.push(entry),
                DayOutcome::Skipped(day) => skipped.push(day),
            }
        }
        skipped.sort_by_key(|d| d.day_index);

        Self {
            series: DebtSeries::from_entries(entries),
            skipped,
        }
    }
}

/// Accumulator for the trailing debt series
#[derive(Debug, Clone)]
pub struct DebtAccumulator {
    window_days: u32,
    max_concurrent_days: usize,
    day_timeout: Option<Duration>,
    builder: NightSummaryBuilder,
}

impl Default for DebtAccumulator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DebtAccumulator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            window_days: config.debt_window_days,
            max_concurrent_days: config.max_concurrent_days.max(1),
            day_timeout: config.day_timeout(),
            builder: NightSummaryBuilder::new(config.marker_policy),
        }
    }

    /// Debt for one night in hours; negative when the night exceeded the target
    pub fn daily_debt(target_hours: f64, summary: &NightSummary) -> f64 {
        target_hours - summary.duration_hours()
    }

    /// Accumulate the debt series for the window ending at `now`.
    ///
    /// Per-day failures are skipped; only a window outside the representable
    /// date range fails the whole call.
    pub async fn accumulate<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
        target_hours: f64,
    ) -> Result<DebtReport, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        let windows = TimeWindow::days_ending(now, self.window_days)?;

        let outcomes: Vec<DayOutcome> = stream::iter(windows.into_iter().enumerate())
            .map(|(day_index, window)| {
                self.evaluate_day(provider, day_index, window, target_hours)
            })
            .buffered(self.max_concurrent_days)
            .collect()
            .await;

        let report = DebtReport::from_outcomes(outcomes);
        info!(
            "sleep debt: {} of {} days recorded, total {:.2}h",
            report.series.len(),
            self.window_days,
            report.series.total()
        );
        Ok(report)
    }

    async fn evaluate_day<P>(
        &self,
        provider: &P,
        day_index: usize,
        window: TimeWindow,
        target_hours: f64,
    ) -> DayOutcome
    where
        P: SleepDataProvider + ?Sized,
    {
        let build = self.builder.build(provider, window);
        let result = match self.day_timeout {
            Some(limit) => tokio::time::timeout(limit, build)
                .await
                .unwrap_or_else(|_| {
                    Err(ComputeError::Timeout {
                        window_start: window.start.to_rfc3339(),
                        seconds: limit.as_secs(),
                    })
                }),
            None => build.await,
        };

        match result {
            Ok(summary) => DayOutcome::Recorded(DebtEntry {
                day_index,
                day_start: window.start,
                debt_hours: Self::daily_debt(target_hours, &summary),
            }),
            Err(e) => {
                if e.is_absence() {
                    debug!("skipping day {day_index} ({}): {e}", window.start.to_rfc3339());
                } else {
                    warn!("skipping day {day_index} ({}): {e}", window.start.to_rfc3339());
                }
                DayOutcome::Skipped(SkippedDay {
                    day_index,
                    day_start: window.start,
                    reason: SkipReason::from(&e),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixtureProvider;
    use crate::test_support::{night_base, night_of_hours, sample};
    use crate::types::{HeartRatePoint, SleepStage, StageSample};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    /// Noon after the night of 2024-01-`day`
    fn noon_after(day: u32) -> DateTime<Utc> {
        night_base(day) + ChronoDuration::hours(14)
    }

    fn config(window_days: u32, concurrency: usize) -> EngineConfig {
        EngineConfig {
            debt_window_days: window_days,
            max_concurrent_days: concurrency,
            ..EngineConfig::with_target(8.0)
        }
    }

    /// Nights of 7h, 6h, 9h on the 12th, 13th, and 14th
    fn three_nights() -> Vec<StageSample> {
        let mut samples = night_of_hours(night_base(12), 7);
        samples.extend(night_of_hours(night_base(13), 6));
        samples.extend(night_of_hours(night_base(14), 9));
        samples
    }

    #[tokio::test]
    async fn test_three_day_series() {
        let provider = FixtureProvider::from_samples(three_nights(), vec![]);
        let accumulator = DebtAccumulator::from_config(&config(3, 1));

        let report = accumulator.accumulate(&provider, noon_after(14), 8.0).await.unwrap();

        assert_eq!(report.series.values(), vec![1.0, 2.0, -1.0]);
        assert_eq!(report.series.total(), 2.0);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_failed_day_is_skipped_not_zero_filled() {
        let day_two = TimeWindow::days_ending(noon_after(14), 3).unwrap()[1];
        let provider = FixtureProvider::from_samples(three_nights(), vec![]).fail_window(day_two);
        let accumulator = DebtAccumulator::from_config(&config(3, 1));

        let report = accumulator.accumulate(&provider, noon_after(14), 8.0).await.unwrap();

        assert_eq!(report.series.len(), 2);
        let days: Vec<usize> = report.series.entries().iter().map(|e| e.day_index).collect();
        assert_eq!(days, vec![0, 2]);
        assert_eq!(report.series.values(), vec![1.0, -1.0]);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].day_index, 1);
        assert_eq!(report.skipped[0].reason, SkipReason::ProviderFailure);
    }

    #[tokio::test]
    async fn test_days_without_samples_are_absent() {
        let provider = FixtureProvider::from_samples(night_of_hours(night_base(14), 8), vec![]);
        let accumulator = DebtAccumulator::from_config(&config(14, 1));

        let report = accumulator.accumulate(&provider, noon_after(14), 8.0).await.unwrap();

        assert_eq!(report.series.len(), 1);
        assert_eq!(report.series.entries()[0].day_index, 13);
        assert_eq!(report.series.values(), vec![0.0]);
        assert_eq!(report.skipped.len(), 13);
        assert!(report.skipped.iter().all(|d| d.reason == SkipReason::NoData));
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let provider = FixtureProvider::from_samples(three_nights(), vec![]);

        let sequential = DebtAccumulator::from_config(&config(5, 1))
            .accumulate(&provider, noon_after(14), 8.0)
            .await
            .unwrap();
        let concurrent = DebtAccumulator::from_config(&config(5, 4))
            .accumulate(&provider, noon_after(14), 8.0)
            .await
            .unwrap();

        assert_eq!(sequential, concurrent);
    }

    /// Provider whose answers arrive in reverse day order
    struct StaggeredProvider {
        inner: FixtureProvider,
        now: DateTime<Utc>,
    }

    #[async_trait]
    impl SleepDataProvider for StaggeredProvider {
        async fn fetch_stage_samples(
            &self,
            window: TimeWindow,
        ) -> Result<Vec<StageSample>, ComputeError> {
            let days_back = (self.now - window.start).num_days().max(0) as u64;
            // Older days answer last
            tokio::time::sleep(Duration::from_millis(100 * days_back)).await;
            self.inner.fetch_stage_samples(window).await
        }

        async fn fetch_heart_rate(
            &self,
            window: TimeWindow,
        ) -> Result<Vec<HeartRatePoint>, ComputeError> {
            self.inner.fetch_heart_rate(window).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_when_completion_is_reversed() {
        let now = noon_after(14);
        let provider = StaggeredProvider {
            inner: FixtureProvider::from_samples(three_nights(), vec![]),
            now,
        };

        let report = DebtAccumulator::from_config(&config(3, 3))
            .accumulate(&provider, now, 8.0)
            .await
            .unwrap();

        assert_eq!(report.series.values(), vec![1.0, 2.0, -1.0]);
    }

    /// Provider that never answers for one window
    struct HangingProvider {
        inner: FixtureProvider,
        hang: TimeWindow,
    }

    #[async_trait]
    impl SleepDataProvider for HangingProvider {
        async fn fetch_stage_samples(
            &self,
            window: TimeWindow,
        ) -> Result<Vec<StageSample>, ComputeError> {
            if window == self.hang {
                futures::future::pending::<()>().await;
            }
            self.inner.fetch_stage_samples(window).await
        }

        async fn fetch_heart_rate(
            &self,
            window: TimeWindow,
        ) -> Result<Vec<HeartRatePoint>, ComputeError> {
            self.inner.fetch_heart_rate(window).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_skips_only_that_day() {
        let now = noon_after(14);
        let provider = HangingProvider {
            inner: FixtureProvider::from_samples(three_nights(), vec![]),
            hang: TimeWindow::days_ending(now, 3).unwrap()[0],
        };
        let mut config = config(3, 1);
        config.day_timeout_secs = Some(5);

        let report = DebtAccumulator::from_config(&config)
            .accumulate(&provider, now, 8.0)
            .await
            .unwrap();

        assert_eq!(report.series.values(), vec![2.0, -1.0]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::Timeout);
    }

    #[tokio::test]
    async fn test_inverted_sample_skips_only_that_day() {
        let mut samples = three_nights();
        samples.push(sample(night_base(13), 200, 100, SleepStage::Core));
        let provider = FixtureProvider::from_samples(samples, vec![]);

        let report = DebtAccumulator::from_config(&config(3, 1))
            .accumulate(&provider, noon_after(14), 8.0)
            .await
            .unwrap();

        assert_eq!(report.series.values(), vec![1.0, -1.0]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].day_index, 1);
        assert_eq!(report.skipped[0].reason, SkipReason::InvalidData);
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_an_error() {
        let provider = FixtureProvider::from_samples(three_nights(), vec![]);
        let accumulator = DebtAccumulator::from_config(&config(u32::MAX, 1));

        let result = accumulator.accumulate(&provider, noon_after(14), 8.0).await;
        assert!(matches!(result, Err(ComputeError::InvalidWindow(_))));
    }

    #[test]
    fn test_daily_debt_sign() {
        let base = night_base(14);
        let builder = NightSummaryBuilder::default();
        let short = builder.summarize(&night_of_hours(base, 6), &[]).unwrap();
        let long = builder.summarize(&night_of_hours(base, 10), &[]).unwrap();

        assert_eq!(DebtAccumulator::daily_debt(8.0, &short), 2.0);
        assert_eq!(DebtAccumulator::daily_debt(8.0, &long), -2.0);
    }
}
