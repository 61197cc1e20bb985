//! Sleep Flux - On-device sleep metrics aggregation and debt-adjusted scoring
//!
//! Flux turns raw provider samples into nightly sleep metrics and a rolling,
//! debt-adjusted sleep score through a deterministic pipeline: stage aggregation
//! + heart-rate reduction → night summary → trailing debt series → score.
//!
//! ## Modules
//!
//! - **Reductions**: `stages` and `heart_rate` are pure, synchronous reductions
//! - **Orchestration**: `summary`, `debt`, and `pipeline` drive an async
//!   `SleepDataProvider` supplied by the host

pub mod config;
pub mod debt;
pub mod error;
pub mod heart_rate;
pub mod pipeline;
pub mod provider;
pub mod score;
pub mod stages;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use debt::{DebtAccumulator, DebtReport, SkipReason, SkippedDay};
pub use error::ComputeError;
pub use heart_rate::{HeartRateReading, HeartRateReducer, HeartRateStats};
pub use pipeline::{SleepPipeline, SleepReport};
pub use provider::{FixtureProvider, SleepDataProvider, SleepFixture};
pub use score::ScoreCalculator;
pub use stages::{MarkerPolicy, StageAggregate, StageAggregator};
pub use summary::NightSummaryBuilder;
pub use types::{
    DebtEntry, DebtSeries, HeartRatePoint, NightSummary, QualityFlag, ScoredSummary, SleepStage,
    StageSample, TimeWindow,
};

/// Flux version embedded in reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name
pub const PRODUCER_NAME: &str = "sleep-flux";
