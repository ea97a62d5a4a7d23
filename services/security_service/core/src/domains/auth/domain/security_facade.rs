//! Security façade + mediator (C14, spec.md §4.11). The single entry point
//! for privileged operations: every call authenticates, authorises,
//! validates, executes, then audits — in that order, unconditionally. The
//! façade only ever hands out operation names and opaque payloads; it never
//! exposes the concrete services it wraps.

use std::sync::Arc;

use shared_error::AppError;
use shared_jwt::{Claims, TokenKind};

use super::audit_log_service::AuditLogService;
use super::http_context::HttpContext;
use super::model::{AuditEventType, EventStatus, NewAuditEvent};
use super::token_service::TokenService;

/// What the façade logs for every call, success or failure.
pub struct OperationContext {
    pub operation: &'static str,
    pub required_role: Option<&'static str>,
    /// Audit event type recorded for this operation, regardless of outcome.
    pub event_type: AuditEventType,
}

#[derive(Debug, Clone)]
pub enum FacadeError {
    Unauthenticated(AppError),
    Forbidden,
    Validation(String),
    Operation(AppError),
}

impl From<FacadeError> for AppError {
    fn from(err: FacadeError) -> Self {
        match err {
            FacadeError::Unauthenticated(e) => e,
            FacadeError::Forbidden => AppError::Forbidden("insufficient role".into()),
            FacadeError::Validation(msg) => AppError::ValidationError(msg),
            FacadeError::Operation(e) => e,
        }
    }
}

pub struct SecurityFacade<T: TokenService, A: AuditLogService> {
    tokens: Arc<T>,
    audit: Arc<A>,
}

impl<T: TokenService, A: AuditLogService> SecurityFacade<T, A> {
    pub fn new(tokens: Arc<T>, audit: Arc<A>) -> Self {
        Self { tokens, audit }
    }

    /// Runs `op.operation` under the mediator pipeline (spec.md §4.11 steps
    /// 1-5). `validate` and `execute` are supplied by the caller since they
    /// are operation-specific; authenticate/authorise/audit are not.
    pub async fn invoke<I, O>(
        &self,
        op: OperationContext,
        access_token: &str,
        ctx: &HttpContext,
        input: I,
        validate: impl FnOnce(&I) -> Result<(), String>,
        execute: impl std::future::Future<Output = Result<O, AppError>>,
    ) -> Result<O, FacadeError> {
        // 1. Authenticate.
        let claims = self
            .tokens
            .validate(access_token, TokenKind::Access)
            .await
            .map_err(FacadeError::Unauthenticated)?;

        // 2. Authorise.
        if let Some(required) = op.required_role {
            if !role_satisfies(&claims, required) {
                self.audit_call(&op, &claims, ctx, EventStatus::Blocked).await;
                return Err(FacadeError::Forbidden);
            }
        }

        // 3. Validate input.
        if let Err(msg) = validate(&input) {
            self.audit_call(&op, &claims, ctx, EventStatus::Failed).await;
            return Err(FacadeError::Validation(msg));
        }

        // 4. Execute.
        let result = execute.await;

        // 5. Audit — always, regardless of outcome.
        let status = if result.is_ok() { EventStatus::Success } else { EventStatus::Failed };
        self.audit_call(&op, &claims, ctx, status).await;

        result.map_err(FacadeError::Operation)
    }

    async fn audit_call(&self, op: &OperationContext, claims: &Claims, ctx: &HttpContext, status: EventStatus) {
        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id: claims.tenant_id,
                user_id: Some(claims.sub),
                event_type: op.event_type,
                event_status: status,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                device_fingerprint: Some(ctx.device_fingerprint.clone()),
                details: serde_json::json!({"operation": op.operation}),
                session_id: None,
                correlation_id: Some(ctx.correlation_id),
            })
            .await;
    }
}

/// Role hierarchy: owner ⊇ admin ⊇ user. A caller with a higher role
/// satisfies a lower requirement.
fn role_satisfies(claims: &Claims, required: &str) -> bool {
    let rank = |r: &str| match r {
        "owner" => 3,
        "admin" => 2,
        "user" => 1,
        _ => 0,
    };
    rank(&claims.role) >= rank(required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::audit_log_repository::AuditLogRepository;
    use super::super::audit_log_service::AuditLogServiceImpl;
    use super::super::events::EventBus;
    use super::super::model::AuditRecord;
    use super::super::repository::RevocationStore;
    use super::super::token_service::{TokenPair, TokenServiceImpl};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    struct InMemoryRevocationStore {
        revoked: Mutex<HashMap<String, ()>>,
        floors: Mutex<HashMap<Uuid, i64>>,
    }

    impl InMemoryRevocationStore {
        fn new() -> Self {
            Self { revoked: Mutex::new(HashMap::new()), floors: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl RevocationStore for InMemoryRevocationStore {
        async fn revoke(&self, jti: &str, _ttl: std::time::Duration) -> Result<bool, AppError> {
            let mut revoked = self.revoked.lock().await;
            Ok(revoked.insert(jti.to_string(), ()).is_none())
        }
        async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
            Ok(self.revoked.lock().await.contains_key(jti))
        }
        async fn set_user_token_floor(&self, user_id: Uuid, floor_iat: i64) -> Result<(), AppError> {
            self.floors.lock().await.insert(user_id, floor_iat);
            Ok(())
        }
        async fn user_token_floor(&self, user_id: Uuid) -> Result<Option<i64>, AppError> {
            Ok(self.floors.lock().await.get(&user_id).copied())
        }
    }

    struct InMemoryAuditLogRepository {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl InMemoryAuditLogRepository {
        fn new() -> Self {
            Self { records: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl AuditLogRepository for InMemoryAuditLogRepository {
        async fn current_tip_hash(&self, tenant_id: Uuid) -> Result<Option<String>, AppError> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .rev()
                .find(|r| r.tenant_id == tenant_id)
                .map(|r| r.integrity_hash.clone()))
        }

        async fn append(&self, record: &AuditRecord) -> Result<AuditRecord, AppError> {
            self.records.lock().await.push(record.clone());
            Ok(record.clone())
        }

        async fn range(
            &self,
            tenant_id: Uuid,
            from: chrono::DateTime<chrono::Utc>,
            to: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<AuditRecord>, AppError> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .filter(|r| r.tenant_id == tenant_id && r.created_at >= from && r.created_at <= to)
                .cloned()
                .collect())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, AppError> {
            Ok(self.records.lock().await.iter().find(|r| r.id == id).cloned())
        }
    }

    fn ctx() -> HttpContext {
        HttpContext {
            ip_address: Some("203.0.113.5".to_string()),
            user_agent: Some("test-agent".to_string()),
            device_fingerprint: "fp-test".to_string(),
            correlation_id: Uuid::new_v4(),
        }
    }

    async fn facade_and_pair() -> (
        SecurityFacade<TokenServiceImpl<InMemoryRevocationStore>, AuditLogServiceImpl<InMemoryAuditLogRepository>>,
        TokenPair,
        Uuid,
    ) {
        let tokens = Arc::new(TokenServiceImpl::new(
            Arc::new(InMemoryRevocationStore::new()),
            "test-secret",
            "kid-1",
            900,
            1_209_600,
        ));
        let events = Arc::new(EventBus::new(16));
        let audit = Arc::new(AuditLogServiceImpl::new(Arc::new(InMemoryAuditLogRepository::new()), events));
        let user_id = Uuid::new_v4();
        let pair = tokens.issue(user_id, Uuid::new_v4(), "user", "fp-test").await.unwrap();
        (SecurityFacade::new(tokens, audit), pair, user_id)
    }

    #[tokio::test]
    async fn invoke_runs_execute_and_audits_on_success() {
        let (facade, pair, _user_id) = facade_and_pair().await;
        let ctx = ctx();
        let op = OperationContext { operation: "test_op", required_role: None, event_type: AuditEventType::LoginSuccess };
        let result = facade
            .invoke(op, &pair.access_token, &ctx, (), |_| Ok(()), async { Ok::<_, AppError>(42) })
            .await;
        assert!(matches!(result, Ok(42)));
    }

    #[tokio::test]
    async fn invoke_rejects_insufficient_role_without_running_execute() {
        let (facade, pair, _user_id) = facade_and_pair().await;
        let ctx = ctx();
        let op = OperationContext { operation: "admin_op", required_role: Some("admin"), event_type: AuditEventType::LoginSuccess };
        let result = facade
            .invoke(op, &pair.access_token, &ctx, (), |_| Ok(()), async { Ok::<_, AppError>(()) })
            .await;
        assert!(matches!(result, Err(FacadeError::Forbidden)));
    }

    #[tokio::test]
    async fn invoke_rejects_invalid_token() {
        let (facade, _pair, _user_id) = facade_and_pair().await;
        let ctx = ctx();
        let op = OperationContext { operation: "test_op", required_role: None, event_type: AuditEventType::LoginSuccess };
        let result = facade
            .invoke(op, "not-a-real-token", &ctx, (), |_| Ok(()), async { Ok::<_, AppError>(()) })
            .await;
        assert!(matches!(result, Err(FacadeError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn invoke_rejects_failed_validation_without_running_execute() {
        let (facade, pair, _user_id) = facade_and_pair().await;
        let ctx = ctx();
        let op = OperationContext { operation: "test_op", required_role: None, event_type: AuditEventType::LoginSuccess };
        let result = facade
            .invoke(op, &pair.access_token, &ctx, (), |_| Err("bad input".to_string()), async { Ok::<_, AppError>(()) })
            .await;
        assert!(matches!(result, Err(FacadeError::Validation(_))));
    }
}
