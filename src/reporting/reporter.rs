//! Result reporter
//!
//! Indexing is best effort: failures are retried a bounded number of
//! times, logged, and then dropped. Callers only learn whether it worked.

use crate::reporting::backend::IndexBackend;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::tools::retry::RetryManager;
use serde::Serialize;
use std::time::Instant;

/// Sends documents to an index backend
pub struct Reporter<B: IndexBackend> {
    /// Backend, absent when reporting is not configured
    backend: Option<B>,

    /// Target index
    index: String,

    /// Retry policy
    retry: RetryManager,

    /// Event sink
    telemetry: TelemetryCollector,
}

impl<B: IndexBackend> Reporter<B> {
    /// Create reporter writing to `index`
    pub fn new(backend: B, index: impl Into<String>, retry: RetryManager) -> Self {
        Self {
            backend: Some(backend),
            index: index.into(),
            retry,
            telemetry: TelemetryCollector::new(),
        }
    }

    /// Create reporter that only logs documents
    pub fn disabled() -> Self {
        Self {
            backend: None,
            index: String::new(),
            retry: RetryManager::new(),
            telemetry: TelemetryCollector::new(),
        }
    }

    /// Share an existing telemetry collector
    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Check if a backend is configured
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Index a document, returning whether it was stored
    ///
    /// Never fails: serialization and transport errors are logged.
    pub async fn report<T: Serialize>(&self, document: &T) -> bool {
        let body = match serde_json::to_value(document) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize document");
                return false;
            }
        };

        let Some(backend) = self.backend.as_ref() else {
            tracing::debug!(document = %body, "reporting disabled, document not indexed");
            return false;
        };

        tracing::info!(index = %self.index, "Indexing documents in {}", self.index);

        let index = self.index.as_str();
        let body = &body;
        let telemetry = &self.telemetry;

        let outcome = self
            .retry
            .execute_with_retry("index document", move || async move {
                let result = backend.index_document(index, body).await;
                telemetry.record(TelemetryEvent::IndexAttempt {
                    index: index.to_string(),
                    success: result.is_ok(),
                    timestamp: Instant::now(),
                });
                result
            })
            .await;

        match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(index = %self.index, error = %e, "Failed Indexing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result, TrackerError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Backend failing a fixed number of times before accepting
    struct CountingBackend {
        failures_left: Mutex<u32>,
        stored: Mutex<Vec<(String, Value)>>,
    }

    impl CountingBackend {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: Mutex::new(times),
                stored: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IndexBackend for CountingBackend {
        async fn index_document(&self, index: &str, body: &Value) -> Result<()> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(TrackerError::IndexError {
                    index: index.to_string(),
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.stored
                .lock()
                .unwrap()
                .push((index.to_string(), body.clone()));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_success() {
        let reporter = Reporter::new(CountingBackend::failing(0), "netpol", RetryManager::new());
        assert!(reporter.report(&json!({"metricName": "x"})).await);

        let stored = reporter.backend.as_ref().unwrap().stored.lock().unwrap().clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, "netpol");
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_recovers_after_transient_failure() {
        let reporter = Reporter::new(CountingBackend::failing(2), "netpol", RetryManager::new());
        assert!(reporter.report(&json!({})).await);

        let stats = reporter.telemetry.get_stats();
        assert_eq!(stats.index_attempts, 3);
        assert_eq!(stats.index_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_gives_up_silently() {
        let reporter = Reporter::new(CountingBackend::failing(10), "netpol", RetryManager::new());
        assert!(!reporter.report(&json!({})).await);
        assert_eq!(reporter.telemetry.get_stats().index_attempts, 3);
    }

    #[tokio::test]
    async fn test_disabled_reporter() {
        let reporter: Reporter<CountingBackend> = Reporter::disabled();
        assert!(!reporter.is_enabled());
        assert!(!reporter.report(&json!({"a": 1})).await);
    }
}
