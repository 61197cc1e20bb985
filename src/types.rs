//! Core types for the Sleep Flux engine
//!
//! This module defines the data structures that flow through the engine: raw
//! provider samples, query windows, nightly summaries, and the debt series.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Seconds per hour, used wherever durations are converted for debt and score
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Sleep stage label attached to a provider interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "StageRepr")]
pub enum SleepStage {
    InBed,
    Awake,
    Core,
    Rem,
    Deep,
    /// Any label outside the known vocabulary (excluded from every bucket)
    Unknown,
}

impl SleepStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::InBed => "in_bed",
            SleepStage::Awake => "awake",
            SleepStage::Core => "core",
            SleepStage::Rem => "rem",
            SleepStage::Deep => "deep",
            SleepStage::Unknown => "unknown",
        }
    }

    /// Decode the integer codes of the platform sleep-analysis vocabulary.
    ///
    /// 0 = in bed, 1 = asleep (unspecified), 2 = awake, 3 = core, 4 = deep, 5 = REM.
    /// Unspecified sleep carries no stage and decodes to `Unknown`.
    pub fn from_raw_value(value: i64) -> Self {
        match value {
            0 => SleepStage::InBed,
            2 => SleepStage::Awake,
            3 => SleepStage::Core,
            4 => SleepStage::Deep,
            5 => SleepStage::Rem,
            _ => SleepStage::Unknown,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "in_bed" | "inbed" => SleepStage::InBed,
            "awake" => SleepStage::Awake,
            "core" | "asleep_core" | "light" => SleepStage::Core,
            "rem" | "asleep_rem" => SleepStage::Rem,
            "deep" | "asleep_deep" => SleepStage::Deep,
            _ => SleepStage::Unknown,
        }
    }
}

/// Wire form of a stage: either a name or a platform integer code
#[derive(Deserialize)]
#[serde(untagged)]
enum StageRepr {
    Code(i64),
    Name(String),
}

impl From<StageRepr> for SleepStage {
    fn from(repr: StageRepr) -> Self {
        match repr {
            StageRepr::Code(code) => SleepStage::from_raw_value(code),
            StageRepr::Name(name) => SleepStage::from_name(&name),
        }
    }
}

/// One labeled interval returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSample {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stage: SleepStage,
}

impl StageSample {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, stage: SleepStage) -> Self {
        Self {
            start_time,
            end_time,
            stage,
        }
    }

    /// Interval length in seconds
    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }
}

/// One heart-rate reading returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRatePoint {
    pub timestamp: DateTime<Utc>,
    pub bpm: f64,
}

/// Half-open query window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ComputeError> {
        if end <= start {
            return Err(ComputeError::InvalidWindow(format!(
                "window end {} is not after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The default "last night" window: the 24 hours ending at `now`
    pub fn last_24_hours(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::hours(24),
            end: now,
        }
    }

    /// The `days` consecutive day-long windows ending at `now`, oldest first.
    ///
    /// Fails with `InvalidWindow` when the first window would start outside the
    /// representable date range.
    pub fn days_ending(now: DateTime<Utc>, days: u32) -> Result<Vec<Self>, ComputeError> {
        let out_of_range = || {
            ComputeError::InvalidWindow(format!(
                "{days} days before {} is out of range",
                now.to_rfc3339()
            ))
        };
        let first = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(out_of_range)?;

        (0..i64::from(days))
            .map(|k| {
                let start = first.checked_add_signed(Duration::days(k));
                let end = first.checked_add_signed(Duration::days(k + 1));
                match (start, end) {
                    (Some(start), Some(end)) => Ok(Self { start, end }),
                    _ => Err(out_of_range()),
                }
            })
            .collect()
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start, self.end)
    }

    /// Whether `instant` lies in `[start, end)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Data-quality observations attached to a summary; they never alter values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// `(end - start) - awake` came out below zero
    NegativeDuration,
    /// No heart-rate statistics were available for the sleep period
    MissingHeartRate,
    /// A sample starts before the leading in-bed marker
    MarkerOutOfOrder,
    /// One or more samples carried a stage outside the known vocabulary
    UnknownStages,
}

/// Structured metrics for one night. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightSummary {
    /// Sleep start (first in-bed sample after the marker)
    pub start_time: DateTime<Utc>,
    /// Sleep end (end of the last sample)
    pub end_time: DateTime<Utc>,
    /// Time asleep: `(end - start) - awake` (seconds)
    pub duration_secs: f64,
    /// Time awake during the sleep period (seconds)
    pub time_awake_secs: f64,
    /// REM sleep (seconds)
    pub time_rem_secs: f64,
    /// Core/light sleep (seconds)
    pub time_core_secs: f64,
    /// Deep sleep (seconds)
    pub time_deep_secs: f64,
    /// Number of awake intervals
    pub interruptions_count: u32,
    /// Time in bed before sleep (seconds)
    pub sleep_onset_latency_secs: f64,
    pub heart_rate_min: f64,
    pub heart_rate_max: f64,
    pub heart_rate_avg: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_flags: Vec<QualityFlag>,
}

impl NightSummary {
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs / SECONDS_PER_HOUR
    }

    pub fn has_flag(&self, flag: QualityFlag) -> bool {
        self.quality_flags.contains(&flag)
    }
}

/// A night summary annotated by the debt and scoring phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSummary {
    pub summary: NightSummary,
    /// Total accumulated debt over the trailing window (hours)
    pub debt: f64,
    /// Debt-adjusted score (percent, not upper-bounded)
    pub score: f64,
}

/// Debt recorded for one successfully summarized day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtEntry {
    /// Position of the day in the trailing window (0 = oldest)
    pub day_index: usize,
    pub day_start: DateTime<Utc>,
    /// `target - actual` in hours; negative values are surplus
    pub debt_hours: f64,
}

/// Per-day debt values, oldest first. Days without data are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebtSeries {
    entries: Vec<DebtEntry>,
}

impl DebtSeries {
    /// Build a series, ordering the entries by day index
    pub fn from_entries(mut entries: Vec<DebtEntry>) -> Self {
        entries.sort_by_key(|e| e.day_index);
        Self { entries }
    }

    pub fn entries(&self) -> &[DebtEntry] {
        &self.entries
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.debt_hours).collect()
    }

    /// Sum of all daily debts (0 for an empty series)
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.debt_hours).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Signed seconds from `start` to `end`, millisecond precision
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 16, h, m, 0).unwrap()
    }

    #[test]
    fn test_stage_deserializes_names_and_codes() {
        let stages: Vec<SleepStage> =
            serde_json::from_str(r#"["in_bed", "awake", "core", "rem", "deep", 4, 1, "nap"]"#)
                .unwrap();
        assert_eq!(
            stages,
            vec![
                SleepStage::InBed,
                SleepStage::Awake,
                SleepStage::Core,
                SleepStage::Rem,
                SleepStage::Deep,
                SleepStage::Deep,
                SleepStage::Unknown,
                SleepStage::Unknown,
            ]
        );
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&SleepStage::InBed).unwrap();
        assert_eq!(json, "\"in_bed\"");
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(at(6, 0), at(6, 0)).is_err());
        assert!(TimeWindow::new(at(6, 0), at(5, 0)).is_err());
        let window = TimeWindow::new(at(5, 0), at(6, 0)).unwrap();
        assert_eq!(window.duration_secs(), 3600.0);
        assert!(window.contains(at(5, 0)));
        assert!(!window.contains(at(6, 0)));
    }

    #[test]
    fn test_window_overlap() {
        let night = TimeWindow::new(at(1, 0), at(5, 0)).unwrap();
        let touching = TimeWindow::new(at(5, 0), at(6, 0)).unwrap();
        let inside = TimeWindow::new(at(2, 0), at(3, 0)).unwrap();
        assert!(!night.overlaps(&touching));
        assert!(night.overlaps(&inside));
        assert!(inside.overlaps(&night));
    }

    #[test]
    fn test_days_ending_is_contiguous_and_oldest_first() {
        let now = at(12, 0);
        let days = TimeWindow::days_ending(now, 14).unwrap();

        assert_eq!(days.len(), 14);
        assert_eq!(days[0].start, now - Duration::days(14));
        assert_eq!(days[13].end, now);
        for pair in days.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_days_ending_out_of_range_is_an_error() {
        let result = TimeWindow::days_ending(at(12, 0), u32::MAX);
        assert!(matches!(result, Err(ComputeError::InvalidWindow(_))));
    }

    #[test]
    fn test_last_24_hours() {
        let window = TimeWindow::last_24_hours(at(8, 0));
        assert_eq!(window.end, at(8, 0));
        assert_eq!(window.duration_secs(), 86_400.0);
    }

    #[test]
    fn test_debt_series_orders_by_day_index() {
        let entry = |day_index, debt_hours| DebtEntry {
            day_index,
            day_start: at(0, 0),
            debt_hours,
        };
        let series = DebtSeries::from_entries(vec![entry(2, 1.5), entry(0, -0.5), entry(1, 2.0)]);

        assert_eq!(series.values(), vec![-0.5, 2.0, 1.5]);
        assert_eq!(series.total(), 3.0);
        assert!(DebtSeries::default().is_empty());
        assert_eq!(DebtSeries::default().total(), 0.0);
    }
}
