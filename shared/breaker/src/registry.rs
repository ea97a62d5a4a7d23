use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::breaker::{BreakerMetrics, CircuitBreaker};
use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::state::State;

/// The C3 façade: a named registry of [`CircuitBreaker`]s, one per outbound
/// dependency. Every outbound call in the service goes through
/// `registry.execute(name, op)` rather than holding a `CircuitBreaker`
/// directly, so call sites never need to know whether a breaker has been
/// registered ahead of time.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    /// Pre-register a breaker with dependency-specific settings (e.g. a
    /// tighter timeout for `cache` than for `email`). Call during
    /// composition-root startup; `execute` will lazily create one with the
    /// default config for any name that was never registered.
    pub async fn register(&self, name: impl Into<String>, config: BreakerConfig) {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), config));
        self.breakers.write().await.insert(name, breaker);
    }

    async fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(name) {
            return existing.clone();
        }
        let mut guard = self.breakers.write().await;
        guard
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name.to_string(), self.default_config.clone())))
            .clone()
    }

    pub async fn execute<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.get_or_create(name).await;
        breaker.execute(operation).await
    }

    pub async fn state_of(&self, name: &str) -> Option<State> {
        let breaker = self.breakers.read().await.get(name)?.clone();
        Some(breaker.state().await)
    }

    pub async fn metrics_of(&self, name: &str) -> Option<BreakerMetrics> {
        let breaker = self.breakers.read().await.get(name)?.clone();
        Some(breaker.metrics())
    }

    /// Health snapshot for every registered breaker — used by the `/health`
    /// endpoint (spec.md §6 "Health endpoint" expansion).
    pub async fn health_snapshot(&self) -> HashMap<String, State> {
        let mut out = HashMap::new();
        for (name, breaker) in self.breakers.read().await.iter() {
            out.insert(name.clone(), breaker.state().await);
        }
        out
    }
}

/// The canonical set of dependency names spec.md §4.2 requires at minimum.
pub const EMAIL: &str = "email";
pub const SMS: &str = "sms";
pub const MFA_PROVIDER: &str = "mfa_provider";
pub const EXTERNAL_API: &str = "external_api";
pub const DATABASE: &str = "database";
pub const CACHE: &str = "cache";
pub const KMS: &str = "kms";
