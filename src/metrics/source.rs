//! Metric source boundary consumed by the detector

use crate::analysis::types::Reading;
use async_trait::async_trait;

/// Provider of the two channel readings
///
/// Both accessors are total: failures are logged by the implementation and
/// returned as [`Reading::Degraded`], never as errors.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Read the primary channel
    async fn read_primary(&self) -> Reading;

    /// Read the secondary channel
    async fn read_secondary(&self) -> Reading;
}

#[async_trait]
impl<'a, S: MetricSource + ?Sized> MetricSource for &'a S {
    async fn read_primary(&self) -> Reading {
        (**self).read_primary().await
    }

    async fn read_secondary(&self) -> Reading {
        (**self).read_secondary().await
    }
}
