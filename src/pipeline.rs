//! Pipeline orchestration
//!
//! This module provides the public API for Sleep Flux. It runs the full flow
//! from provider samples to a scored nightly report:
//!
//! 1. NightSummaryBuilder - last night's summary (stage aggregation + heart rate)
//! 2. DebtAccumulator - trailing per-day debt series
//! 3. ScoreCalculator - debt-adjusted score attached to the summary

use std::future::Future;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::debt::{DebtAccumulator, DebtReport};
use crate::error::ComputeError;
use crate::provider::SleepDataProvider;
use crate::score::ScoreCalculator;
use crate::summary::NightSummaryBuilder;
use crate::types::{NightSummary, ScoredSummary, TimeWindow};

/// Complete output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepReport {
    pub scored: ScoredSummary,
    /// Per-day debt for charting, plus the skipped days
    pub debt: DebtReport,
    pub target_sleep_hours: f64,
    pub generated_for: DateTime<Utc>,
}

/// Configured sleep pipeline. Holds no mutable state; runs are independent.
#[derive(Debug, Clone)]
pub struct SleepPipeline {
    config: EngineConfig,
    builder: NightSummaryBuilder,
    accumulator: DebtAccumulator,
}

impl SleepPipeline {
    /// Create a pipeline, validating the configuration
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            builder: NightSummaryBuilder::new(config.marker_policy),
            accumulator: DebtAccumulator::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summary for an explicit window
    pub async fn summarize<P>(
        &self,
        provider: &P,
        window: TimeWindow,
    ) -> Result<NightSummary, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        self.builder.build(provider, window).await
    }

    /// Summary for the 24 hours ending at `now`
    pub async fn last_night<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<NightSummary, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        self.builder.build_last_night(provider, now).await
    }

    /// Trailing debt series ending at `now`
    pub async fn debt<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<DebtReport, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        self.accumulator
            .accumulate(provider, now, self.config.target_sleep_hours)
            .await
    }

    /// Full run: last night's summary, the debt series, and the score.
    ///
    /// Fails with `NoData` when there is no summary for last night, before any
    /// debt query is issued; provider faults on last night's stage query propagate.
    pub async fn run<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<SleepReport, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        let summary = match self.last_night(provider, now).await {
            Ok(summary) => summary,
            Err(e) => {
                if e.is_absence() {
                    info!("no sleep recorded in the 24h before {}", now.to_rfc3339());
                }
                return Err(e);
            }
        };

        let debt = self.debt(provider, now).await?;
        let scored = ScoreCalculator::annotate(
            Some(summary),
            &debt.series,
            self.config.target_sleep_hours,
        )?;

        Ok(SleepReport {
            scored,
            debt,
            target_sleep_hours: self.config.target_sleep_hours,
            generated_for: now,
        })
    }

    /// Run to completion on a dedicated single-threaded runtime.
    ///
    /// For hosts without an async runtime (the CLI and the C ABI).
    pub fn run_blocking<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<SleepReport, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        block_on(self.run(provider, now))?
    }

    pub fn summarize_blocking<P>(
        &self,
        provider: &P,
        window: TimeWindow,
    ) -> Result<NightSummary, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        block_on(self.summarize(provider, window))?
    }

    pub fn debt_blocking<P>(
        &self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<DebtReport, ComputeError>
    where
        P: SleepDataProvider + ?Sized,
    {
        block_on(self.debt(provider, now))?
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output, ComputeError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| ComputeError::Runtime(e.to_string()))?;
    Ok(runtime.block_on(future))
}
