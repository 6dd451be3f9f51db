//! Retry control with bounded exponential backoff
//!
//! A [`RetryController`] is created per logical transfer. It decides, for each
//! classified exchange, whether to retry and how long to wait first. Server
//! errors and request timeouts have separate budgets: S3 reports a stalled
//! request body as `400 RequestTimeout`, which deserves a more patient policy
//! than a failing server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::classify::Outcome;
use crate::error::{Error, Result};

/// Bounded exponential backoff for one class of retryable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::server_default()
    }
}

impl RetryPolicy {
    /// Policy for 5xx responses and transport failures
    pub fn server_default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }

    /// Policy for `RequestTimeout` responses
    pub fn timeout_default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 500,
            max_backoff_ms: 20_000,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// `initial * 2^(attempt-1)`, capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let base_ms = self.initial_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(base_ms.min(self.max_backoff_ms))
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(format!(
                "{name} retry policy needs at least one attempt"
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(format!(
                "{name} retry policy: initial backoff {}ms exceeds maximum {}ms",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Retry settings for a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub server: RetryPolicy,
    pub timeout: RetryPolicy,
    /// Treat adapter-level failures like server errors instead of failing fast
    pub retry_transport_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            server: RetryPolicy::server_default(),
            timeout: RetryPolicy::timeout_default(),
            retry_transport_errors: true,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        self.server.validate("server")?;
        self.timeout.validate("timeout")
    }
}

/// Retry policy builder for easy customization
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    policy: RetryPolicy,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::server_default(),
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.policy.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.policy.max_backoff_ms = ms;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One classified exchange, as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAttempt {
    /// 1-based attempt number for the current exchange
    pub attempt: u32,
    /// Part number, for chunked transfers
    pub chunk: Option<u32>,
    pub outcome: Outcome,
}

/// What the transfer should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Complete,
    Retry(Duration),
    Abort {
        /// The failure was retryable but the budget ran out
        exhausted: bool,
    },
}

/// Shared count of retry decisions.
///
/// Clones observe the same count, so a caller can hand one to a transfer and
/// read it afterwards.
#[derive(Debug, Clone, Default)]
pub struct RetryCounter(Arc<AtomicU64>);

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Per-transfer retry decision maker
#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
    counter: RetryCounter,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_counter(config, RetryCounter::new())
    }

    pub fn with_counter(config: RetryConfig, counter: RetryCounter) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Number of times [`decide`](Self::decide) has been called
    pub fn invocations(&self) -> u64 {
        self.counter.get()
    }

    pub fn counter(&self) -> &RetryCounter {
        &self.counter
    }

    /// Decide what to do after `attempt`. Every call is counted.
    pub fn decide(&self, attempt: &TransferAttempt) -> Decision {
        self.counter.increment();

        let policy = match attempt.outcome {
            Outcome::Success => return Decision::Complete,
            Outcome::FatalError => return Decision::Abort { exhausted: false },
            Outcome::RetryableServerError => &self.config.server,
            Outcome::RetryableTimeout => &self.config.timeout,
        };

        if attempt.attempt >= policy.max_attempts {
            return Decision::Abort { exhausted: true };
        }

        Decision::Retry(policy.backoff(attempt.attempt))
    }
}

/// Waits out backoff delays
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(n: u32, outcome: Outcome) -> TransferAttempt {
        TransferAttempt {
            attempt: n,
            chunk: None,
            outcome,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_cap() {
        let policy = RetryPolicy {
            max_attempts: 64,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        assert_eq!(policy.backoff(10), Duration::from_millis(5000));
        assert_eq!(policy.backoff(64), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let policy = RetryPolicy::timeout_default();
        let delays: Vec<_> = (1..=30).map(|n| policy.backoff(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_retry_builder() {
        let policy = RetryBuilder::new()
            .max_attempts(5)
            .initial_backoff_ms(200)
            .max_backoff_ms(20000)
            .build();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff_ms, 200);
        assert_eq!(policy.max_backoff_ms, 20000);
    }

    #[test]
    fn test_validate() {
        assert!(RetryConfig::default().validate().is_ok());

        let config = RetryConfig {
            server: RetryBuilder::new().max_attempts(0).build(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            timeout: RetryBuilder::new()
                .initial_backoff_ms(500)
                .max_backoff_ms(100)
                .build(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_budget_exceeds_server_budget() {
        let config = RetryConfig::default();
        assert!(config.timeout.max_attempts > 5);
        assert!(config.timeout.max_attempts > config.server.max_attempts);
    }

    #[test]
    fn test_decide_success_and_fatal() {
        let controller = RetryController::new(RetryConfig::default());
        assert_eq!(
            controller.decide(&attempt(1, Outcome::Success)),
            Decision::Complete
        );
        assert_eq!(
            controller.decide(&attempt(1, Outcome::FatalError)),
            Decision::Abort { exhausted: false }
        );
        assert_eq!(controller.invocations(), 2);
    }

    #[test]
    fn test_decide_server_error_until_exhausted() {
        let controller = RetryController::new(RetryConfig::default());
        for n in 1..5 {
            assert!(matches!(
                controller.decide(&attempt(n, Outcome::RetryableServerError)),
                Decision::Retry(_)
            ));
        }
        assert_eq!(
            controller.decide(&attempt(5, Outcome::RetryableServerError)),
            Decision::Abort { exhausted: true }
        );
        assert_eq!(controller.invocations(), 5);
    }

    #[test]
    fn test_decide_timeout_uses_timeout_policy() {
        let controller = RetryController::new(RetryConfig::default());
        assert_eq!(
            controller.decide(&attempt(5, Outcome::RetryableTimeout)),
            Decision::Retry(Duration::from_millis(8000))
        );
        assert_eq!(
            controller.decide(&attempt(10, Outcome::RetryableTimeout)),
            Decision::Abort { exhausted: true }
        );
    }

    #[test]
    fn test_injected_counter_is_shared() {
        let counter = RetryCounter::new();
        let controller = RetryController::with_counter(RetryConfig::default(), counter.clone());
        controller.decide(&attempt(1, Outcome::RetryableTimeout));
        controller.decide(&attempt(2, Outcome::Success));
        assert_eq!(counter.get(), 2);

        // A fresh controller gets its own counter
        let other = RetryController::new(RetryConfig::default());
        assert_eq!(other.invocations(), 0);
    }
}
