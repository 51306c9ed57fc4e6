//! Convergence detection
//!
//! Polls two metric channels until neither shows a tolerance-exceeding
//! change for `convergence_period`, or until the deadline
//! (`convergence_timeout + convergence_period` from start) passes.
//!
//! Each tick samples the primary channel first. The secondary channel is
//! only sampled when the primary raw value did not move, so a tick never
//! updates both channels.

use crate::analysis::types::{
    ChannelKind, ChannelUpdate, DetectionConfig, DetectionResult, MetricChannel, Reading,
    TickOutcome,
};
use crate::metrics::MetricSource;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use chrono::Utc;
use tokio::time::{sleep, Instant};

/// Dual-channel stabilization detector
pub struct ConvergenceDetector<S: MetricSource> {
    /// Where readings come from
    source: S,

    /// Timing configuration
    config: DetectionConfig,

    /// Node name used in log lines
    node_name: String,

    /// Event sink
    telemetry: TelemetryCollector,

    primary: MetricChannel,
    secondary: MetricChannel,

    /// Start of the run
    start: Instant,

    /// Last baseline acceptance on either channel
    last_change: Instant,

    /// Ticks executed
    ticks: u64,
}

impl<S: MetricSource> ConvergenceDetector<S> {
    /// Create detector with unprimed (zero) channels
    pub fn new(source: S, config: DetectionConfig) -> Self {
        let now = Instant::now();
        Self {
            source,
            config,
            node_name: String::new(),
            telemetry: TelemetryCollector::new(),
            primary: MetricChannel::new(ChannelKind::Primary, 0),
            secondary: MetricChannel::new(ChannelKind::Secondary, 0),
            start: now,
            last_change: now,
            ticks: 0,
        }
    }

    /// Set node name used in log lines
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    /// Share an existing telemetry collector
    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Restart the clocks and seed both channels from fresh readings
    ///
    /// Priming does not count as a change and emits no events.
    pub async fn prime(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_change = now;
        self.ticks = 0;

        let primary = self.source.read_primary().await;
        self.note_degraded(ChannelKind::Primary, &primary);
        self.primary = MetricChannel::new(ChannelKind::Primary, primary.value());

        let secondary = self.source.read_secondary().await;
        self.note_degraded(ChannelKind::Secondary, &secondary);
        self.secondary = MetricChannel::new(ChannelKind::Secondary, secondary.value());
    }

    /// Execute one poll tick
    pub async fn tick(&mut self) -> TickOutcome {
        let primary = self.source.read_primary().await;
        self.note_degraded(ChannelKind::Primary, &primary);
        let now = Instant::now();

        let outcome = match self.primary.observe(primary.value(), now) {
            Some(update) => {
                self.accept(&update, now);
                TickOutcome::Primary(update)
            }
            None => {
                let secondary = self.source.read_secondary().await;
                self.note_degraded(ChannelKind::Secondary, &secondary);
                let now = Instant::now();

                match self.secondary.observe(secondary.value(), now) {
                    Some(update) => {
                        self.accept(&update, now);
                        TickOutcome::Secondary(update)
                    }
                    None => TickOutcome::Quiet,
                }
            }
        };

        self.ticks += 1;
        self.telemetry.record(TelemetryEvent::TickCompleted {
            tick: self.ticks,
            timestamp: std::time::Instant::now(),
        });

        outcome
    }

    /// Check whether the loop should run another tick at `now`
    pub fn should_continue(&self, now: Instant) -> bool {
        now.duration_since(self.last_change) < self.config.convergence_period
            && now.duration_since(self.start) < self.config.deadline()
    }

    /// Run the polling loop to completion
    pub async fn run(&mut self) -> DetectionResult {
        let started_at = Utc::now();
        self.prime().await;

        while self.should_continue(Instant::now()) {
            self.tick().await;
            sleep(self.config.poll_interval).await;
        }

        let deadline = self.config.deadline();
        let timed_out = Instant::now().duration_since(self.start) >= deadline;
        if timed_out {
            tracing::warn!(
                node = %self.node_name,
                deadline_secs = deadline.as_secs(),
                "TIMEOUT: {} {} seconds passed",
                self.node_name,
                deadline.as_secs()
            );
        }

        self.telemetry.record(TelemetryEvent::DetectionFinished {
            timed_out,
            timestamp: std::time::Instant::now(),
        });

        let stabilized_after = self.last_change.duration_since(self.start);
        let stabilized_at = started_at
            + chrono::Duration::from_std(stabilized_after).unwrap_or_else(|_| chrono::Duration::zero());

        DetectionResult {
            started_at,
            stabilized_at,
            stabilized_after,
            final_primary_count: self.primary.raw,
            final_secondary_count: self.secondary.raw,
            timed_out,
            ticks: self.ticks,
        }
    }

    fn accept(&mut self, update: &ChannelUpdate, now: Instant) {
        if update.baseline_moved {
            self.last_change = now;
        }

        tracing::info!(
            node = %self.node_name,
            channel = ?update.channel,
            raw = update.raw,
            baseline = update.baseline,
            "{}: {}={}, convergence flows={}",
            self.node_name,
            update.channel,
            update.raw,
            update.baseline
        );

        self.telemetry.record(TelemetryEvent::ChannelChanged {
            update: update.clone(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn note_degraded(&self, channel: ChannelKind, reading: &Reading) {
        if let Reading::Degraded { reason } = reading {
            self.telemetry.record(TelemetryEvent::ProbeDegraded {
                channel,
                reason: reason.clone(),
                timestamp: std::time::Instant::now(),
            });
        }
    }

    /// Get primary channel state
    pub fn primary(&self) -> &MetricChannel {
        &self.primary
    }

    /// Get secondary channel state
    pub fn secondary(&self) -> &MetricChannel {
        &self.secondary
    }

    /// Instant of the last accepted change
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Start of the current run
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Get configuration
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Get telemetry collector
    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }
}
