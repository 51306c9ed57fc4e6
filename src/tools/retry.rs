//! Retry manager with exponential backoff
//!
//! Bounded retry strategy for transient failures (result indexing):
//! - Max attempts: 3 by default
//! - Strategy: binary exponential with ±25% jitter, capped
//! - Every failed attempt is logged before the next one

use crate::errors::{Result, TrackerError};
use std::time::Duration;
use tokio::time::sleep;

/// Default number of attempts (first try included)
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff
const BASE_DELAY_MS: u64 = 500;

/// Maximum delay cap
const MAX_DELAY_MS: u64 = 8000;

/// Retry manager with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    /// Maximum attempts, first try included
    max_attempts: u32,

    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum delay cap in milliseconds
    max_delay_ms: u64,

    /// Enable jitter
    enable_jitter: bool,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryManager {
    /// Create new retry manager with default settings
    pub fn new() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Create retry manager with custom settings
    ///
    /// `max_attempts` is clamped to at least one.
    pub fn with_config(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Disable jitter (deterministic delays)
    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Execute operation with retry logic
    ///
    /// `label` names the operation in log lines.
    pub async fn execute_with_retry<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !self.is_retryable(&e) {
                        tracing::warn!(operation = label, attempt, error = %e, "permanent failure");
                        return Err(e);
                    }

                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "attempt failed"
                    );

                    if attempt >= self.max_attempts {
                        return Err(TrackerError::Generic(format!(
                            "{} gave up after {} attempts: {}",
                            label, attempt, e
                        )));
                    }

                    sleep(self.calculate_delay(attempt)).await;
                }
            }
        }
    }

    /// Calculate delay for given attempt number
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let delay_ms = exponential_delay.min(self.max_delay_ms);

        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as i64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((delay_ms as i64) + random_jitter as i64).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Upper bound on time spent sleeping between attempts (jitter excluded)
    pub fn max_total_wait_time(&self) -> Duration {
        let total_ms: u64 = (1..self.max_attempts)
            .map(|attempt| {
                self.base_delay_ms
                    .saturating_mul(2u64.saturating_pow(attempt))
                    .min(self.max_delay_ms)
            })
            .sum();

        Duration::from_millis(total_ms)
    }

    /// Check if error is retryable
    fn is_retryable(&self, error: &TrackerError) -> bool {
        match error {
            // Transient
            TrackerError::Timeout { .. } => true,
            TrackerError::HttpError(_) => true,
            TrackerError::IndexError { .. } => true,
            TrackerError::Generic(_) => true,

            // Permanent
            TrackerError::ConfigError(_) => false,
            TrackerError::SerializationError(_) => false,
            TrackerError::ParseError(_) => false,

            _ => false,
        }
    }

    /// Get max attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_first_attempt() {
        let retry_manager = RetryManager::new();

        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = retry_manager
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Ok::<i32, TrackerError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let retry_manager = RetryManager::new();

        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = retry_manager
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    let mut attempts = count.lock().unwrap();
                    *attempts += 1;
                    let current = *attempts;
                    drop(attempts);

                    if current < 3 {
                        Err(TrackerError::Generic("Transient error".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_max_attempts_exceeded() {
        let retry_manager = RetryManager::with_config(3, 10);

        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = retry_manager
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Err::<i32, _>(TrackerError::Timeout { duration_ms: 5 })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*attempt_count.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error() {
        let retry_manager = RetryManager::new();

        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = retry_manager
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Err::<i32, _>(TrackerError::ConfigError("Permanent error".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(TrackerError::ConfigError(_))));
        assert_eq!(*attempt_count.lock().unwrap(), 1);
    }

    #[test]
    fn test_calculate_delay() {
        let retry_manager = RetryManager::with_config(5, 500).without_jitter();

        assert_eq!(retry_manager.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(retry_manager.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(retry_manager.calculate_delay(3), Duration::from_millis(4000));
        assert_eq!(retry_manager.calculate_delay(4), Duration::from_millis(8000));
        assert_eq!(retry_manager.calculate_delay(10), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn test_max_total_wait_time() {
        // Sleeps happen only between attempts: 1000 + 2000
        let retry_manager = RetryManager::new();
        assert_eq!(retry_manager.max_total_wait_time(), Duration::from_millis(3000));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryManager::with_config(0, 10).max_attempts(), 1);
    }

    #[test]
    fn test_is_retryable() {
        let retry_manager = RetryManager::new();

        assert!(retry_manager.is_retryable(&TrackerError::Timeout { duration_ms: 1000 }));
        assert!(retry_manager.is_retryable(&TrackerError::Generic("test".to_string())));
        assert!(retry_manager.is_retryable(&TrackerError::IndexError {
            index: "i".to_string(),
            status: 502,
            body: String::new(),
        }));
        assert!(!retry_manager.is_retryable(&TrackerError::ConfigError("test".to_string())));
        assert!(!retry_manager.is_retryable(&TrackerError::ParseError("test".to_string())));
    }
}
