//! Convergence detection system
//! Decides when two noisy flow counts have settled, or that they never did

pub mod convergence;
pub mod types;

pub use convergence::ConvergenceDetector;
pub use types::{
    ChannelKind, ChannelUpdate, DetectionConfig, DetectionResult, MetricChannel, Reading,
    TickOutcome,
};
