//! Telemetry for the tracker
//!
//! Collects detector and reporter events in memory and sets up the
//! process-wide log subscriber. Nothing here feeds back into detection.

pub mod logging;

pub use logging::{init_logging, LogFormat};

use crate::analysis::types::{ChannelKind, ChannelUpdate};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    // Detector events
    TickCompleted {
        tick: u64,
        timestamp: Instant,
    },
    ChannelChanged {
        update: ChannelUpdate,
        timestamp: Instant,
    },
    ProbeDegraded {
        channel: ChannelKind,
        reason: String,
        timestamp: Instant,
    },
    DetectionFinished {
        timed_out: bool,
        timestamp: Instant,
    },

    // Reporter events
    IndexAttempt {
        index: String,
        success: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub ticks: u64,
    pub primary_changes: u64,
    pub secondary_changes: u64,
    pub baseline_resets: u64,
    pub degraded_probes: u64,
    pub index_attempts: u64,
    pub index_failures: u64,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::TickCompleted { .. } => {
                    stats.ticks += 1;
                }
                TelemetryEvent::ChannelChanged { update, .. } => {
                    match update.channel {
                        ChannelKind::Primary => stats.primary_changes += 1,
                        ChannelKind::Secondary => stats.secondary_changes += 1,
                    }
                    if update.baseline_moved {
                        stats.baseline_resets += 1;
                    }
                }
                TelemetryEvent::ProbeDegraded { .. } => {
                    stats.degraded_probes += 1;
                }
                TelemetryEvent::DetectionFinished { .. } => {}
                TelemetryEvent::IndexAttempt { success, .. } => {
                    stats.index_attempts += 1;
                    if !*success {
                        stats.index_failures += 1;
                    }
                }
            }
        }

        lock(&self.events).push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Channel updates in the order they were observed
    pub fn channel_updates(&self) -> Vec<ChannelUpdate> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::ChannelChanged { update, .. } => Some(update.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
