//! Debt-adjusted sleep score
//!
//! score = actual_hours * 100 / (target + total_debt / 5), rounded to 2 decimals.
//! The score has no upper bound: above 100 means more sleep than the
//! debt-adjusted need.

use log::debug;

use crate::error::ComputeError;
use crate::types::{DebtSeries, NightSummary, ScoredSummary};

/// Spreads the accumulated debt over several nights instead of repaying it in one
pub const DEBT_SMOOTHING_DIVISOR: f64 = 5.0;

/// Score calculator
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Hours of sleep needed tonight given the target and the accumulated debt
    pub fn sleep_needed(target_hours: f64, total_debt_hours: f64) -> f64 {
        target_hours + total_debt_hours / DEBT_SMOOTHING_DIVISOR
    }

    /// Score last night against the debt-adjusted need.
    ///
    /// Fails with `NoData` when there is no summary for last night. An empty debt
    /// series scores against the plain target.
    pub fn score(
        summary: Option<&NightSummary>,
        debt: &DebtSeries,
        target_hours: f64,
    ) -> Result<f64, ComputeError> {
        let summary = summary
            .ok_or_else(|| ComputeError::NoData("no sleep recorded for last night".to_string()))?;

        if !target_hours.is_finite() || target_hours <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "target sleep must be a positive number of hours, got {target_hours}"
            )));
        }

        let total_debt = debt.total();
        let needed = Self::sleep_needed(target_hours, total_debt);
        if needed <= 0.0 {
            return Err(ComputeError::NonPositiveSleepNeed(needed));
        }

        let score = round_to_hundredths(summary.duration_hours() * 100.0 / needed);
        debug!(
            "score {score} from {:.2}h slept against {needed:.2}h needed ({} debt days)",
            summary.duration_hours(),
            debt.len()
        );
        Ok(score)
    }

    /// Attach the total debt and the score to a summary
    pub fn annotate(
        summary: Option<NightSummary>,
        debt: &DebtSeries,
        target_hours: f64,
    ) -> Result<ScoredSummary, ComputeError> {
        let score = Self::score(summary.as_ref(), debt, target_hours)?;
        let summary = summary
            .ok_or_else(|| ComputeError::NoData("no sleep recorded for last night".to_string()))?;

        Ok(ScoredSummary {
            summary,
            debt: debt.total(),
            score,
        })
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
