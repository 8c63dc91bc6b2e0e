//! Isolation guard and scoped store

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;
use warden_db::{NewRecord, RecordRow, RecordStore, Scope};
use warden_types::{AuditEvent, RequestSecurityContext, SharedAuditSink, TenantId};

use crate::{IsolationConfig, IsolationError};

/// Key under which record data may name its tenant
pub const TENANT_KEY: &str = "tenant_id";

const MAX_LIST_LIMIT: i64 = 500;

/// Single entry point to tenant-owned records
pub struct IsolationGuard<S: RecordStore + ?Sized> {
    store: Arc<S>,
    config: IsolationConfig,
    audit: SharedAuditSink,
}

impl<S: RecordStore + ?Sized> Clone for IsolationGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<S: RecordStore + ?Sized> IsolationGuard<S> {
    /// Create a new guard
    pub fn new(store: Arc<S>, config: IsolationConfig, audit: SharedAuditSink) -> Self {
        Self {
            store,
            config,
            audit,
        }
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    /// Store confined to the context's tenant.
    ///
    /// Without a context every operation fails in strict mode and runs
    /// unscoped in permissive mode.
    pub fn scoped<'a>(&'a self, ctx: Option<&'a RequestSecurityContext>) -> ScopedStore<'a, S> {
        ScopedStore {
            guard: self,
            ctx,
            bypass: false,
        }
    }

    /// Unscoped store for a verified system context.
    ///
    /// Granted only when bypass is enabled and `ctx` is a system context;
    /// every grant and refusal is audited.
    pub fn bypass<'a>(
        &'a self,
        ctx: &'a RequestSecurityContext,
        reason: &str,
    ) -> Result<ScopedStore<'a, S>, IsolationError> {
        if !self.config.bypass_allowed || !ctx.is_system() {
            tracing::warn!(
                user_id = %ctx.user_id(),
                reason,
                bypass_allowed = self.config.bypass_allowed,
                system = ctx.is_system(),
                "isolation bypass denied"
            );
            self.audit.record(AuditEvent::IsolationBypassDenied {
                user_id: ctx.user_id(),
                reason: reason.to_string(),
            });
            return Err(IsolationError::BypassDenied);
        }

        tracing::warn!(user_id = %ctx.user_id(), tenant_id = %ctx.tenant_id(), reason, "isolation bypass granted");
        self.audit.record(AuditEvent::IsolationBypass {
            user_id: ctx.user_id(),
            tenant_id: ctx.tenant_id(),
            reason: reason.to_string(),
        });
        Ok(ScopedStore {
            guard: self,
            ctx: Some(ctx),
            bypass: true,
        })
    }
}

impl<S: RecordStore + ?Sized> std::fmt::Debug for IsolationGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Scoped store
// =============================================================================

/// Record operations with the tenant predicate applied
pub struct ScopedStore<'a, S: RecordStore + ?Sized> {
    guard: &'a IsolationGuard<S>,
    ctx: Option<&'a RequestSecurityContext>,
    bypass: bool,
}

impl<S: RecordStore + ?Sized> ScopedStore<'_, S> {
    /// Scope every query of this store runs under
    pub fn scope(&self, operation: &'static str) -> Result<Scope, IsolationError> {
        if self.bypass {
            return Ok(Scope::Unscoped);
        }
        if let Some(ctx) = self.ctx {
            return Ok(Scope::Tenant(ctx.tenant_id()));
        }

        let config = &self.guard.config;
        if config.strict || config.warn_on_missing {
            tracing::warn!(operation, enforced = config.strict, "data operation without tenant context");
            self.guard.audit.record(AuditEvent::TenantContextMissing {
                operation: operation.to_string(),
                enforced: config.strict,
            });
        }
        if config.strict {
            Err(IsolationError::TenantContextMissing)
        } else {
            Ok(Scope::Unscoped)
        }
    }

    /// Fetch one record; another tenant's record is `NotFound`
    pub async fn get(&self, collection: &str, id: Uuid) -> Result<RecordRow, IsolationError> {
        let scope = self.scope("get")?;
        self.guard
            .store
            .get(scope, collection, id)
            .await?
            .ok_or(IsolationError::NotFound)
    }

    /// List records of the scope, newest first
    pub async fn list(&self, collection: &str, limit: i64) -> Result<Vec<RecordRow>, IsolationError> {
        let scope = self.scope("list")?;
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        Ok(self.guard.store.list(scope, collection, limit).await?)
    }

    /// Insert a record owned by the scope's tenant.
    ///
    /// A `tenant_id` in `data` must name the caller's tenant; it is moved
    /// out of the data and into the owner column. Unscoped inserts must name
    /// their tenant this way.
    pub async fn insert(&self, collection: &str, mut data: Value) -> Result<RecordRow, IsolationError> {
        let scope = self.scope("insert")?;
        let named = take_tenant(&mut data);

        let owner = match (scope, named) {
            (Scope::Tenant(tenant), None) => tenant,
            (Scope::Tenant(tenant), Some(Ok(named))) if named == tenant => tenant,
            (Scope::Tenant(tenant), Some(_)) => {
                tracing::warn!(%tenant, collection, "insert named a foreign tenant");
                return Err(IsolationError::CrossTenantWrite);
            }
            (Scope::Unscoped, Some(Ok(named))) => named,
            (Scope::Unscoped, Some(Err(()))) => return Err(IsolationError::CrossTenantWrite),
            (Scope::Unscoped, None) => return Err(IsolationError::TenantContextMissing),
        };

        let record = NewRecord {
            id: Uuid::new_v4(),
            tenant_id: owner.0,
            collection: collection.to_string(),
            data,
        };
        Ok(self.guard.store.insert(record).await?)
    }

    /// Replace a record's data; its tenant never changes
    pub async fn update(
        &self,
        collection: &str,
        id: Uuid,
        mut data: Value,
    ) -> Result<RecordRow, IsolationError> {
        let scope = self.scope("update")?;

        if let Some(named) = take_tenant(&mut data) {
            let current = self
                .guard
                .store
                .get(scope, collection, id)
                .await?
                .ok_or(IsolationError::NotFound)?;
            if named != Ok(current.tenant_id()) {
                tracing::warn!(record_id = %id, collection, "update tried to change tenant_id");
                return Err(IsolationError::TenantIdImmutable);
            }
        }

        self.guard
            .store
            .update(scope, collection, id, data)
            .await?
            .ok_or(IsolationError::NotFound)
    }

    /// Delete a record; another tenant's record is `NotFound`
    pub async fn delete(&self, collection: &str, id: Uuid) -> Result<(), IsolationError> {
        let scope = self.scope("delete")?;
        if self.guard.store.delete(scope, collection, id).await? {
            Ok(())
        } else {
            Err(IsolationError::NotFound)
        }
    }
}

/// Remove and parse the tenant key from object data.
///
/// `None` if absent, `Some(Err(()))` if present but not a tenant id.
fn take_tenant(data: &mut Value) -> Option<Result<TenantId, ()>> {
    let raw = data.as_object_mut()?.remove(TENANT_KEY)?;
    Some(
        raw.as_str()
            .and_then(|s| TenantId::parse(s).ok())
            .ok_or(()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_tenant() {
        let tenant = TenantId::new();
        let mut data = json!({"name": "x", "tenant_id": tenant.to_string()});
        assert_eq!(take_tenant(&mut data), Some(Ok(tenant)));
        assert_eq!(data, json!({"name": "x"}));

        let mut bogus = json!({"tenant_id": 42});
        assert_eq!(take_tenant(&mut bogus), Some(Err(())));

        let mut absent = json!({"name": "x"});
        assert_eq!(take_tenant(&mut absent), None);

        let mut scalar = json!("not an object");
        assert_eq!(take_tenant(&mut scalar), None);
    }
}
