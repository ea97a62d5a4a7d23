//! In-process event bus (C15). Deliberately not the teacher's NATS-backed
//! `shared/events` — spec.md scopes this to in-process fan-out only, so a
//! `tokio::sync::broadcast` channel over a closed event enum is the whole
//! implementation; there is no outbound wire format to design.

use tokio::sync::broadcast;
use uuid::Uuid;

/// Every event this core publishes. Closed on purpose: a new event kind is
/// a deliberate, reviewable addition, not something a caller can spell
/// wrong as a free string.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    UserRegistered { user_id: Uuid, tenant_id: Uuid },
    LoginSucceeded { user_id: Uuid, session_id: Uuid },
    LoginFailed { email: String, tenant_id: Uuid },
    AccountLocked { user_id: Uuid, locked_until: chrono::DateTime<chrono::Utc> },
    SessionEvicted { session_id: Uuid, user_id: Uuid },
    PasswordChanged { user_id: Uuid },
    HighRiskAudit { record_id: Uuid, risk_score: i32 },
}

/// Thin wrapper around `broadcast::Sender` so call sites depend on a type
/// name instead of the channel internals. Subscribers that lag behind drop
/// old events rather than block the publisher — acceptable here since every
/// consumer (metrics, notifications) is best-effort.
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event; `Err` only if there
    /// are currently none. Callers should not treat that as fatal.
    pub fn publish(&self, event: AuthEvent) -> Result<usize, broadcast::error::SendError<AuthEvent>> {
        self.sender.send(event)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(AuthEvent::LoginFailed {
            email: "user@example.com".to_string(),
            tenant_id: Uuid::new_v4(),
        })
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, AuthEvent::LoginFailed { .. }));
    }

    #[test]
    fn publish_with_no_subscribers_errs_but_does_not_panic() {
        let bus = EventBus::default();
        let result = bus.publish(AuthEvent::PasswordChanged { user_id: Uuid::new_v4() });
        assert!(result.is_err());
    }
}
