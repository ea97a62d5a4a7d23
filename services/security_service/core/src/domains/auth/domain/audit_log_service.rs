//! Audit log service (C8, spec.md §4.6): the tamper-evident hash chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use shared_error::AppError;

use super::audit_log_repository::AuditLogRepository;
use super::errors::AuditError;
use super::events::{AuthEvent, EventBus};
use super::model::{AuditRecord, EventStatus, NewAuditEvent, AUDIT_GENESIS_HASH};

#[async_trait]
pub trait AuditLogService: Send + Sync {
    async fn append(&self, event: NewAuditEvent) -> Result<AuditRecord, AppError>;

    /// Recomputes the chain over `[from, to]` and returns the id of the
    /// first inconsistent record, or `Ok(None)` if the range verifies.
    async fn verify_chain(
        &self,
        tenant_id: Uuid,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError>;
}

/// Risk-scoring strategy keyed on `event_status` (spec.md §4.6 step 3).
fn risk_score(status: EventStatus, details: &serde_json::Value) -> i32 {
    let attempts = details.get("attempts").and_then(|v| v.as_i64()).unwrap_or(0);
    let new_device = details.get("new_device").and_then(|v| v.as_bool()).unwrap_or(false);
    let location_change = details.get("location_change").and_then(|v| v.as_bool()).unwrap_or(false);

    match status {
        EventStatus::Failed => {
            let mut score = 10;
            if attempts > 3 {
                score += 20;
            }
            if new_device {
                score += 15;
            }
            score
        }
        EventStatus::Blocked => 90,
        EventStatus::Success => {
            if location_change {
                25
            } else {
                0
            }
        }
        EventStatus::Pending => 5,
    }
}

/// `SHA256(user_id || "|" || event_type || "|" || rfc3339_micros(created_at)
/// || "|" || previous_hash)` per spec.md §6 "Audit log integrity hash".
fn integrity_hash(
    user_id: Option<Uuid>,
    event_type: &str,
    created_at: chrono::DateTime<Utc>,
    previous_hash: &str,
) -> String {
    let user_part = user_id.map(|id| id.to_string()).unwrap_or_default();
    let timestamp = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    let payload = format!("{}|{}|{}|{}", user_part, event_type, timestamp, previous_hash);
    shared_crypto::sha256_hex(payload.as_bytes())
}

pub struct AuditLogServiceImpl<R: AuditLogRepository> {
    repository: Arc<R>,
    events: Arc<EventBus>,
}

impl<R: AuditLogRepository> AuditLogServiceImpl<R> {
    pub fn new(repository: Arc<R>, events: Arc<EventBus>) -> Self {
        Self { repository, events }
    }
}

#[async_trait]
impl<R: AuditLogRepository> AuditLogService for AuditLogServiceImpl<R> {
    async fn append(&self, event: NewAuditEvent) -> Result<AuditRecord, AppError> {
        if event.ip_address.as_deref().unwrap_or("").is_empty() {
            return Err(AuditError::Invalid("ip_address must not be empty".into()).into());
        }

        let previous_hash = self
            .repository
            .current_tip_hash(event.tenant_id)
            .await?
            .unwrap_or_else(|| AUDIT_GENESIS_HASH.to_string());

        let created_at = Utc::now();
        let event_type_str = event.event_type.to_string();
        let event_status_str = event.event_status.to_string();
        let score = risk_score(event.event_status, &event.details);
        let hash = integrity_hash(event.user_id, &event_type_str, created_at, &previous_hash);

        let record = AuditRecord {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            user_id: event.user_id,
            event_type: event_type_str,
            event_status: event_status_str,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            device_fingerprint: event.device_fingerprint,
            details: sqlx::types::Json(event.details),
            risk_score: score,
            session_id: event.session_id,
            correlation_id: event.correlation_id,
            created_at,
            previous_hash,
            integrity_hash: hash,
        };

        let persisted = self.repository.append(&record).await?;

        // Dispatch is fire-and-forget: a failure here must never surface to
        // the caller (spec.md §7 "Local recovery").
        if score >= 80 {
            let level = if score >= 95 { "critical" } else { "warn" };
            tracing::warn!(risk_score = score, level, record_id = %persisted.id, "high-risk audit event");
            let _ = self.events.publish(AuthEvent::HighRiskAudit {
                record_id: persisted.id,
                risk_score: score,
            });
        }

        Ok(persisted)
    }

    async fn verify_chain(
        &self,
        tenant_id: Uuid,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> Result<Option<Uuid>, AppError> {
        let records = self.repository.range(tenant_id, from, to).await?;
        let mut expected_previous: Option<String> = None;

        for record in &records {
            if let Some(expected) = &expected_previous {
                if &record.previous_hash != expected {
                    return Ok(Some(record.id));
                }
            }
            let recomputed = integrity_hash(
                record.user_id,
                &record.event_type,
                record.created_at,
                &record.previous_hash,
            );
            if recomputed != record.integrity_hash {
                return Ok(Some(record.id));
            }
            expected_previous = Some(record.integrity_hash.clone());
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_with_many_attempts_and_new_device_scores_high() {
        let details = serde_json::json!({"attempts": 4, "new_device": true});
        assert_eq!(risk_score(EventStatus::Failed, &details), 45);
    }

    #[test]
    fn blocked_is_always_ninety() {
        assert_eq!(risk_score(EventStatus::Blocked, &serde_json::json!({})), 90);
    }

    #[test]
    fn success_with_location_change_scores_twenty_five() {
        let details = serde_json::json!({"location_change": true});
        assert_eq!(risk_score(EventStatus::Success, &details), 25);
    }

    #[test]
    fn pending_is_always_five() {
        assert_eq!(risk_score(EventStatus::Pending, &serde_json::json!({})), 5);
    }

    #[test]
    fn integrity_hash_is_deterministic_for_same_inputs() {
        let created_at = Utc::now();
        let a = integrity_hash(Some(Uuid::nil()), "LOGIN_SUCCESS", created_at, AUDIT_GENESIS_HASH);
        let b = integrity_hash(Some(Uuid::nil()), "LOGIN_SUCCESS", created_at, AUDIT_GENESIS_HASH);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn integrity_hash_changes_with_previous_hash() {
        let created_at = Utc::now();
        let a = integrity_hash(Some(Uuid::nil()), "LOGIN_SUCCESS", created_at, AUDIT_GENESIS_HASH);
        let b = integrity_hash(Some(Uuid::nil()), "LOGIN_SUCCESS", created_at, "deadbeef");
        assert_ne!(a, b);
    }
}
