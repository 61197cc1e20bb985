//! Sample providers
//!
//! The engine never reads a health store itself. It consumes a provider
//! capability that, given a time window, returns stage intervals and heart-rate
//! points. Authorization and the choice of backing store belong to the host.

mod fixture;

pub use fixture::{FixtureProvider, SleepFixture};

use async_trait::async_trait;

use crate::error::ComputeError;
use crate::types::{HeartRatePoint, StageSample, TimeWindow};

/// Capability for fetching raw sleep samples
///
/// Implementations report store failures as `ComputeError::ProviderFailure`.
/// Returned samples need not be sorted; the stage aggregator's marker policy
/// decides how their order is interpreted.
#[async_trait]
pub trait SleepDataProvider: Send + Sync {
    /// Fetch the sleep-stage intervals for a window
    async fn fetch_stage_samples(&self, window: TimeWindow)
        -> Result<Vec<StageSample>, ComputeError>;

    /// Fetch the heart-rate points for a window
    async fn fetch_heart_rate(&self, window: TimeWindow)
        -> Result<Vec<HeartRatePoint>, ComputeError>;
}

#[async_trait]
impl<T: SleepDataProvider + ?Sized> SleepDataProvider for std::sync::Arc<T> {
    async fn fetch_stage_samples(
        &self,
        window: TimeWindow,
    ) -> Result<Vec<StageSample>, ComputeError> {
        (**self).fetch_stage_samples(window).await
    }

    async fn fetch_heart_rate(
        &self,
        window: TimeWindow,
    ) -> Result<Vec<HeartRatePoint>, ComputeError> {
        (**self).fetch_heart_rate(window).await
    }
}
