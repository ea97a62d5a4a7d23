//! Circuit breaker façade (C3): per-dependency state machines with a
//! sliding-window failure-rate trip condition, wrapped in a named registry so
//! every outbound dependency (email, sms, mfa_provider, external_api,
//! database, cache, kms) is isolated from the others' failures.

pub mod breaker;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;

pub use breaker::{BreakerMetrics, CircuitBreaker};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::BreakerError;
pub use registry::{BreakerRegistry, CACHE, DATABASE, EMAIL, EXTERNAL_API, KMS, MFA_PROVIDER, SMS};
pub use state::State;
