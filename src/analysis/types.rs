//! Convergence analysis type definitions

use crate::errors::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Noise band for the primary (logical flow) channel
pub const PRIMARY_TOLERANCE: u64 = 50;

/// Noise band for the secondary (OpenFlow) channel
pub const SECONDARY_TOLERANCE: u64 = 100;

/// Default poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// The two signals the detector watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Logical flow count in the southbound database
    Primary,

    /// OpenFlow count on the integration bridge
    Secondary,
}

impl ChannelKind {
    /// Fixed tolerance for this channel
    pub fn tolerance(&self) -> u64 {
        match self {
            ChannelKind::Primary => PRIMARY_TOLERANCE,
            ChannelKind::Secondary => SECONDARY_TOLERANCE,
        }
    }

    /// Label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            ChannelKind::Primary => "logical flows",
            ChannelKind::Secondary => "OVS flows",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One observation from a metric source
///
/// A failed probe is reported as `Degraded` and consumed as `0`, so the
/// detector cannot tell it apart from a genuinely empty table. The tag
/// keeps the difference visible at the source boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    /// Probe succeeded
    Observed(u64),

    /// Probe failed; counts as zero
    Degraded { reason: String },
}

impl Reading {
    /// Numeric value the detector consumes
    pub fn value(&self) -> u64 {
        match self {
            Reading::Observed(value) => *value,
            Reading::Degraded { .. } => 0,
        }
    }

    /// Check if the probe failed
    pub fn is_degraded(&self) -> bool {
        matches!(self, Reading::Degraded { .. })
    }

    /// Build a degraded reading
    pub fn degraded(reason: impl Into<String>) -> Self {
        Reading::Degraded {
            reason: reason.into(),
        }
    }
}

/// Noise-tolerant state of one channel
#[derive(Debug, Clone)]
pub struct MetricChannel {
    /// Which signal this is
    pub kind: ChannelKind,

    /// Last observed value
    pub raw: u64,

    /// Last value accepted as a real change
    pub baseline: u64,

    /// When the baseline last moved
    pub last_change: Option<Instant>,

    /// Fluctuation band that does not count as change
    pub tolerance: u64,
}

impl MetricChannel {
    /// Create channel primed with an initial value
    pub fn new(kind: ChannelKind, initial: u64) -> Self {
        Self {
            kind,
            raw: initial,
            baseline: initial,
            last_change: None,
            tolerance: kind.tolerance(),
        }
    }

    /// Apply a new sample
    ///
    /// Returns `None` when the sample equals the last raw value. Otherwise
    /// `raw` is always updated, and `baseline` only moves when the sample
    /// is more than `tolerance` away from it.
    pub fn observe(&mut self, value: u64, now: Instant) -> Option<ChannelUpdate> {
        if value == self.raw {
            return None;
        }

        let previous_raw = self.raw;
        self.raw = value;

        let baseline_moved = value.abs_diff(self.baseline) > self.tolerance;
        if baseline_moved {
            self.baseline = value;
            self.last_change = Some(now);
        }

        Some(ChannelUpdate {
            channel: self.kind,
            previous_raw,
            raw: value,
            baseline: self.baseline,
            baseline_moved,
        })
    }
}

/// What a tick saw on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub channel: ChannelKind,
    pub previous_raw: u64,
    pub raw: u64,
    pub baseline: u64,
    pub baseline_moved: bool,
}

/// Result of a single poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Primary moved; secondary was not sampled
    Primary(ChannelUpdate),

    /// Primary was unchanged and secondary moved
    Secondary(ChannelUpdate),

    /// Neither channel moved
    Quiet,
}

impl TickOutcome {
    /// Check if this tick reset the quiescence clock
    pub fn reset_quiescence(&self) -> bool {
        match self {
            TickOutcome::Primary(update) | TickOutcome::Secondary(update) => update.baseline_moved,
            TickOutcome::Quiet => false,
        }
    }

    /// Channel update, if any
    pub fn update(&self) -> Option<&ChannelUpdate> {
        match self {
            TickOutcome::Primary(update) | TickOutcome::Secondary(update) => Some(update),
            TickOutcome::Quiet => None,
        }
    }
}

/// Timing configuration for one detection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Time between ticks
    pub poll_interval: Duration,

    /// Required quiescence before declaring convergence
    pub convergence_period: Duration,

    /// Extra budget on top of the period before giving up
    pub convergence_timeout: Duration,
}

impl DetectionConfig {
    /// Create config; all durations must be positive
    pub fn new(
        poll_interval: Duration,
        convergence_period: Duration,
        convergence_timeout: Duration,
    ) -> Result<Self> {
        for (name, value) in [
            ("poll interval", poll_interval),
            ("convergence period", convergence_period),
            ("convergence timeout", convergence_timeout),
        ] {
            if value.is_zero() {
                return Err(TrackerError::ConfigError(format!("{} must be positive", name)));
            }
        }

        if convergence_timeout.checked_add(convergence_period).is_none() {
            return Err(TrackerError::ConfigError(
                "convergence timeout plus period is too large".to_string(),
            ));
        }

        Ok(Self {
            poll_interval,
            convergence_period,
            convergence_timeout,
        })
    }

    /// Create config from whole seconds, using the default poll interval
    pub fn from_secs(convergence_period: u64, convergence_timeout: u64) -> Result<Self> {
        Self::new(
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            Duration::from_secs(convergence_period),
            Duration::from_secs(convergence_timeout),
        )
    }

    /// Total wait budget measured from start
    ///
    /// The timeout stacks on top of the period: a run that never settles
    /// waits `timeout + period`, not `timeout`.
    pub fn deadline(&self) -> Duration {
        self.convergence_timeout.saturating_add(self.convergence_period)
    }
}

/// Outcome of a detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Wall-clock time of the last accepted change
    pub stabilized_at: DateTime<Utc>,

    /// Offset of the last accepted change from start
    pub stabilized_after: Duration,

    /// Last observed primary value
    pub final_primary_count: u64,

    /// Last observed secondary value
    pub final_secondary_count: u64,

    /// Whether the deadline was reached
    pub timed_out: bool,

    /// Number of ticks executed
    pub ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_tolerances() {
        assert_eq!(ChannelKind::Primary.tolerance(), 50);
        assert_eq!(ChannelKind::Secondary.tolerance(), 100);
    }

    #[test]
    fn test_degraded_reading_is_zero() {
        let reading = Reading::degraded("ovn-sbctl: no leader");
        assert_eq!(reading.value(), 0);
        assert!(reading.is_degraded());

        let zero = Reading::Observed(0);
        assert_eq!(zero.value(), 0);
        assert!(!zero.is_degraded());
        assert_ne!(reading, zero);
    }

    #[tokio::test]
    async fn test_observe_unchanged_returns_none() {
        let mut channel = MetricChannel::new(ChannelKind::Primary, 100);
        assert!(channel.observe(100, Instant::now()).is_none());
        assert!(channel.last_change.is_none());
    }

    #[tokio::test]
    async fn test_observe_within_tolerance() {
        let mut channel = MetricChannel::new(ChannelKind::Primary, 100);
        let update = channel.observe(150, Instant::now()).unwrap();

        assert!(!update.baseline_moved);
        assert_eq!(channel.raw, 150);
        assert_eq!(channel.baseline, 100);
        assert!(channel.last_change.is_none());
    }

    #[tokio::test]
    async fn test_observe_beyond_tolerance() {
        let mut channel = MetricChannel::new(ChannelKind::Primary, 100);
        let now = Instant::now();
        let update = channel.observe(151, now).unwrap();

        assert!(update.baseline_moved);
        assert_eq!(update.previous_raw, 100);
        assert_eq!(channel.baseline, 151);
        assert_eq!(channel.last_change, Some(now));
    }

    #[tokio::test]
    async fn test_drop_beyond_tolerance() {
        let mut channel = MetricChannel::new(ChannelKind::Secondary, 1000);
        let update = channel.observe(0, Instant::now()).unwrap();
        assert!(update.baseline_moved);
        assert_eq!(channel.baseline, 0);
    }

    #[tokio::test]
    async fn test_drift_compares_against_baseline() {
        // Steps of 30 each stay inside the band individually, but the
        // third one is 90 away from the baseline.
        let mut channel = MetricChannel::new(ChannelKind::Primary, 100);
        let now = Instant::now();
        assert!(!channel.observe(130, now).unwrap().baseline_moved);
        assert!(!channel.observe(160, now).unwrap().baseline_moved);
        assert!(channel.observe(190, now).unwrap().baseline_moved);
        assert_eq!(channel.baseline, 190);
    }

    #[test]
    fn test_config_rejects_zero() {
        let result = DetectionConfig::new(
            Duration::from_secs(1),
            Duration::ZERO,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(TrackerError::ConfigError(_))));
    }

    #[test]
    fn test_config_rejects_overflowing_deadline() {
        let result = DetectionConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(u64::MAX),
        );
        assert!(matches!(result, Err(TrackerError::ConfigError(_))));
    }

    #[test]
    fn test_deadline_is_additive() {
        let config = DetectionConfig::from_secs(10, 5).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.deadline(), Duration::from_secs(15));
    }

    #[test]
    fn test_tick_outcome_reset() {
        let update = ChannelUpdate {
            channel: ChannelKind::Secondary,
            previous_raw: 10,
            raw: 20,
            baseline: 10,
            baseline_moved: false,
        };
        assert!(!TickOutcome::Secondary(update.clone()).reset_quiescence());
        assert!(TickOutcome::Secondary(ChannelUpdate {
            baseline_moved: true,
            ..update
        })
        .reset_quiescence());
        assert!(TickOutcome::Quiet.update().is_none());
    }
}
