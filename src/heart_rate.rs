//! Heart-rate reduction
//!
//! Reduces heart-rate points within the sleep period into min/max/average.
//! Heart rate is an optional enrichment: absence or a provider error degrades to
//! a neutral zero triple instead of failing the night.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{HeartRatePoint, TimeWindow};

/// Min/max/average beats per minute
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRateStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Outcome of the heart-rate reduction, tagged by which path produced it
#[derive(Debug, Clone, PartialEq)]
pub enum HeartRateReading {
    Measured(HeartRateStats),
    /// No readings fell inside the sleep period
    NoSamples,
    /// The provider failed for the sleep period
    Unavailable(String),
}

impl HeartRateReading {
    /// Statistics to report; the degraded paths yield `(0, 0, 0)`
    pub fn stats(&self) -> HeartRateStats {
        match self {
            HeartRateReading::Measured(stats) => *stats,
            HeartRateReading::NoSamples | HeartRateReading::Unavailable(_) => {
                HeartRateStats::default()
            }
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, HeartRateReading::Measured(_))
    }
}

/// Heart-rate reducer
pub struct HeartRateReducer;

impl HeartRateReducer {
    /// Reduce the points whose timestamp lies in `[window.start, window.end)`.
    ///
    /// Non-finite readings are ignored.
    pub fn reduce(points: &[HeartRatePoint], window: &TimeWindow) -> HeartRateReading {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for point in points
            .iter()
            .filter(|p| window.contains(p.timestamp) && p.bpm.is_finite())
        {
            count += 1;
            sum += point.bpm;
            min = min.min(point.bpm);
            max = max.max(point.bpm);
        }

        if count == 0 {
            return HeartRateReading::NoSamples;
        }

        HeartRateReading::Measured(HeartRateStats {
            min,
            max,
            avg: sum / count as f64,
        })
    }

    /// Reduce a provider result, turning a failure into the degraded reading
    pub fn from_provider(
        result: Result<Vec<HeartRatePoint>, ComputeError>,
        window: &TimeWindow,
    ) -> HeartRateReading {
        match result {
            Ok(points) => Self::reduce(&points, window),
            Err(e) => {
                warn!("heart rate unavailable for {}: {}", window.start.to_rfc3339(), e);
                HeartRateReading::Unavailable(e.to_string())
            }
        }
    }
}
