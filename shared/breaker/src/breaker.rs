use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::state::{Inner, State};

/// A single named circuit breaker. Named per the `jonathanbelolo-composable-rust`
/// `agent-patterns` resilience breaker (the `name` field, `allow_request`/
/// `record_success`/`record_failure` shape), with the fuller metrics surface
/// of its `runtime` crate sibling folded in.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: RwLock<Inner>,
    total_calls: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
    total_timeouts: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerMetrics {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    pub total_timeouts: u64,
}

impl BreakerMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.total_successes as f64 / self.total_calls as f64
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let window_cap = config.sliding_window_size;
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(Inner::new(window_cap)),
            total_calls: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> State {
        self.inner.read().await.state
    }

    /// Execute `operation` through the breaker. `E` is the wrapped
    /// operation's own error type.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let may_attempt = {
            let mut inner = self.inner.write().await;
            inner.can_attempt(self.config.open_duration, self.config.half_open_permitted_calls)
        };

        if !may_attempt {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(breaker = %self.name, "circuit breaker rejected call: OPEN");
            return Err(BreakerError::OpenRejected(self.name.clone()));
        }

        let result = tokio::time::timeout(self.config.call_timeout, operation()).await;

        match result {
            Ok(Ok(value)) => {
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                let mut inner = self.inner.write().await;
                inner.on_success(
                    self.config.failure_rate_threshold_percent,
                    self.config.minimum_calls,
                    self.config.half_open_permitted_calls,
                );
                Ok(value)
            }
            Ok(Err(err)) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                let mut inner = self.inner.write().await;
                inner.on_failure(self.config.failure_rate_threshold_percent, self.config.minimum_calls);
                if inner.state == State::Open {
                    tracing::warn!(breaker = %self.name, "circuit breaker tripped OPEN");
                }
                Err(BreakerError::ExecutionFailed(err))
            }
            Err(_elapsed) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                let mut inner = self.inner.write().await;
                inner.on_failure(self.config.failure_rate_threshold_percent, self.config.minimum_calls);
                Err(BreakerError::Timeout(self.name.clone()))
            }
        }
    }

    pub fn metrics(&self) -> BreakerMetrics {
        BreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::new(self.config.sliding_window_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> BreakerConfig {
        BreakerConfig::builder()
            .failure_rate_threshold_percent(50)
            .sliding_window_size(4)
            .minimum_calls(4)
            .open_duration(Duration::from_millis(50))
            .half_open_permitted_calls(2)
            .call_timeout(Duration::from_millis(200))
            .build()
    }

    #[tokio::test]
    async fn closed_on_success() {
        let breaker = CircuitBreaker::new("test", test_config());
        let result: Result<i32, &str> = breaker.execute(|| async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..4 {
            let _: Result<i32, &str> = breaker.execute(|| async { Err("boom") }).await;
        }
        assert_eq!(breaker.state().await, State::Open);
    }

    #[tokio::test]
    async fn rejects_when_open() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..4 {
            let _: Result<i32, &str> = breaker.execute(|| async { Err("boom") }).await;
        }
        let result: Result<i32, &str> = breaker.execute(|| async { Ok(1) }).await;
        assert!(matches!(result, Err(BreakerError::OpenRejected(_))));
    }

    #[tokio::test]
    async fn transitions_to_half_open_and_closes() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..4 {
            let _: Result<i32, &str> = breaker.execute(|| async { Err("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let r1: Result<i32, &str> = breaker.execute(|| async { Ok(1) }).await;
        assert!(r1.is_ok());
        let r2: Result<i32, &str> = breaker.execute(|| async { Ok(1) }).await;
        assert!(r2.is_ok());
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig::builder()
                .sliding_window_size(2)
                .minimum_calls(2)
                .failure_rate_threshold_percent(50)
                .call_timeout(Duration::from_millis(10))
                .build(),
        );
        let result: Result<i32, &str> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Timeout(_))));
    }

    #[tokio::test]
    async fn metrics_track_calls() {
        let breaker = CircuitBreaker::new("test", test_config());
        let _: Result<i32, &str> = breaker.execute(|| async { Ok(1) }).await;
        let _: Result<i32, &str> = breaker.execute(|| async { Err("x") }).await;
        let m = breaker.metrics();
        assert_eq!(m.total_calls, 2);
        assert_eq!(m.total_successes, 1);
        assert_eq!(m.total_failures, 1);
    }
}
