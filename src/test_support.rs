//! Shared fixtures for unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{HeartRatePoint, SleepStage, StageSample};

/// 22:00 UTC on 2024-01-`day`
pub(crate) fn night_base(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 22, 0, 0).unwrap()
}

pub(crate) fn at_minute(base: DateTime<Utc>, minute: i64) -> DateTime<Utc> {
    base + Duration::minutes(minute)
}

pub(crate) fn sample(base: DateTime<Utc>, from: i64, to: i64, stage: SleepStage) -> StageSample {
    StageSample::new(at_minute(base, from), at_minute(base, to), stage)
}

/// A night from 22:00 to 06:30 with a 20 minute in-bed marker.
///
/// Sleep period 22:20-06:30 (29400 s), awake 1500 s in two interruptions,
/// core 19800 s, deep 3600 s, REM 3900 s, duration 27900 s (7.75 h).
pub(crate) fn typical_night(base: DateTime<Utc>) -> Vec<StageSample> {
    vec![
        sample(base, 0, 20, SleepStage::InBed),
        sample(base, 20, 510, SleepStage::InBed),
        sample(base, 30, 180, SleepStage::Core),
        sample(base, 180, 240, SleepStage::Deep),
        sample(base, 240, 250, SleepStage::Awake),
        sample(base, 250, 300, SleepStage::Rem),
        sample(base, 300, 480, SleepStage::Core),
        sample(base, 480, 495, SleepStage::Awake),
        sample(base, 495, 510, SleepStage::Rem),
    ]
}

/// A night whose sleep period lasts exactly `hours` with no awake time
pub(crate) fn night_of_hours(base: DateTime<Utc>, hours: i64) -> Vec<StageSample> {
    let end = 10 + hours * 60;
    vec![
        sample(base, 0, 10, SleepStage::InBed),
        sample(base, 10, end, SleepStage::InBed),
        sample(base, 10, end, SleepStage::Core),
    ]
}

/// Heart rate around `typical_night`: only 62, 55, 50, 58 fall in `[22:20, 06:30)`
pub(crate) fn typical_heart_rate(base: DateTime<Utc>) -> Vec<HeartRatePoint> {
    [(10, 80.0), (20, 62.0), (120, 55.0), (240, 50.0), (400, 58.0), (510, 65.0), (520, 90.0)]
        .into_iter()
        .map(|(minute, bpm)| HeartRatePoint {
            timestamp: at_minute(base, minute),
            bpm,
        })
        .collect()
}
