//! Tenant resolution for the stateless HTTP surface. Every authenticated
//! operation is scoped to a tenant (spec.md's multi-tenant framing), but
//! `LoginReq`/`RefreshReq` carry no tenant field of their own — the caller
//! is expected to present an `X-Tenant-Id` header, mirroring how API
//! gateways for multi-tenant platforms typically resolve the tenant ahead
//! of routing to the auth service itself.
//!
//! Registration is the one path that can also *create* a tenant: a client
//! with no existing tenant relationship submits `tenantName` and this
//! resolver finds-or-creates it, matching `RegisterReq::tenant_name`'s doc
//! comment ("creates new tenant if it doesn't exist, joins if it does").

use std::sync::Arc;

use uuid::Uuid;

use shared_error::AppError;

use super::model::Tenant;
use super::repository::TenantRepository;

pub struct TenantResolver<T: TenantRepository> {
    tenants: Arc<T>,
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl<T: TenantRepository> TenantResolver<T> {
    pub fn new(tenants: Arc<T>) -> Self {
        Self { tenants }
    }

    /// Resolves the tenant for an already-a-member request (login, refresh,
    /// user lookups). An explicit header is required — there is no implicit
    /// default tenant, since that would let one tenant's credentials be
    /// silently checked against another's without the caller asking for it.
    pub async fn resolve_existing(&self, tenant_header: Option<Uuid>) -> Result<Uuid, AppError> {
        let tenant_id = tenant_header.ok_or_else(|| AppError::ValidationError("X-Tenant-Id header is required".into()))?;
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
        if tenant.deleted_at.is_some() {
            return Err(AppError::NotFound("tenant not found".into()));
        }
        Ok(tenant.tenant_id)
    }

    /// Resolves (or creates) the tenant for a registration request. If
    /// `X-Tenant-Id` is present, the request joins that tenant and
    /// `tenant_name` is ignored; otherwise `tenant_name` is required and a
    /// tenant is found-or-created by its slug.
    pub async fn resolve_for_registration(
        &self,
        tenant_header: Option<Uuid>,
        tenant_name: Option<&str>,
    ) -> Result<Uuid, AppError> {
        if let Some(tenant_id) = tenant_header {
            return self.resolve_existing(Some(tenant_id)).await;
        }

        let name = tenant_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::ValidationError("tenantName is required when no tenant is specified".into()))?;

        let slug = slugify(name);
        if let Some(existing) = self.tenants.find_by_slug(&slug).await? {
            return Ok(existing.tenant_id);
        }

        let now = chrono::Utc::now();
        let tenant = Tenant {
            tenant_id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            plan: "free".to_string(),
            plan_expires_at: None,
            settings: sqlx::types::Json(serde_json::json!({})),
            status: "active".to_string(),
            owner_user_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let created = self.tenants.create(&tenant).await?;
        Ok(created.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct InMemoryTenantRepository {
        tenants: Mutex<Vec<Tenant>>,
    }

    impl InMemoryTenantRepository {
        fn new() -> Self {
            Self { tenants: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl TenantRepository for InMemoryTenantRepository {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
            Ok(self.tenants.lock().await.iter().find(|t| t.tenant_id == id).cloned())
        }
        async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError> {
            self.tenants.lock().await.push(tenant.clone());
            Ok(tenant.clone())
        }
        async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, AppError> {
            Ok(self.tenants.lock().await.iter().find(|t| t.name == name).cloned())
        }
        async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
            Ok(self.tenants.lock().await.iter().find(|t| t.slug == slug).cloned())
        }
    }

    #[tokio::test]
    async fn resolve_existing_requires_header() {
        let resolver = TenantResolver::new(Arc::new(InMemoryTenantRepository::new()));
        let result = resolver.resolve_existing(None).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn registration_creates_tenant_on_first_use_and_joins_on_second() {
        let resolver = TenantResolver::new(Arc::new(InMemoryTenantRepository::new()));
        let first = resolver.resolve_for_registration(None, Some("Acme Corp")).await.unwrap();
        let second = resolver.resolve_for_registration(None, Some("acme corp")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn registration_requires_name_when_no_header() {
        let resolver = TenantResolver::new(Arc::new(InMemoryTenantRepository::new()));
        let result = resolver.resolve_for_registration(None, None).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
