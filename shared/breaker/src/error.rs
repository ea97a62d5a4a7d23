use thiserror::Error;

/// C3's error taxonomy — what `execute` can fail with, independent of the
/// wrapped operation's own error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    OpenRejected(String),
    #[error("call to '{0}' exceeded its timeout")]
    Timeout(String),
    #[error("wrapped operation failed: {0}")]
    ExecutionFailed(E),
}

impl<E> BreakerError<E> {
    pub fn is_open_rejected(&self) -> bool {
        matches!(self, BreakerError::OpenRejected(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout(_))
    }
}
