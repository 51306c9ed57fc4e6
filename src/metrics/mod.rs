//! Metric sources
//!
//! The detector only sees the [`MetricSource`] trait; [`OvnMetricSource`]
//! is the production implementation backed by the OVN/OVS CLIs.

pub mod source;
pub mod ovn;

pub use source::MetricSource;
pub use ovn::{OvnDatabase, OvnMetricSource};
