//! Membership resolution and administration

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use warden_db::{MembershipChange, MembershipRepository, MembershipRow, TenantRepository};
use warden_types::{
    AuditEvent, IneligibleReason, RequestSecurityContext, Role, SharedAuditSink, TenantId, UserId,
};

use crate::AuthError;

/// Outcome of resolving a (user, tenant) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Active member of a tenant in good standing
    Granted(Role),
    /// Not allowed to act in the tenant
    Denied(IneligibleReason),
}

impl Resolution {
    /// The granted role, or `TenantIneligible`
    pub fn require(self) -> Result<Role, AuthError> {
        match self {
            Self::Granted(role) => Ok(role),
            Self::Denied(reason) => Err(AuthError::TenantIneligible { reason }),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Decides whether a user may act in a tenant and with which role
#[derive(Clone)]
pub struct MembershipResolver {
    memberships: Arc<dyn MembershipRepository>,
    tenants: Arc<dyn TenantRepository>,
    cache: Option<Cache<(UserId, TenantId), Resolution>>,
    audit: SharedAuditSink,
}

impl MembershipResolver {
    /// Create a resolver; a zero `cache_ttl` disables caching
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        tenants: Arc<dyn TenantRepository>,
        cache_ttl: Duration,
        audit: SharedAuditSink,
    ) -> Self {
        let cache = (!cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(100_000)
                .time_to_live(cache_ttl)
                .build()
        });
        Self {
            memberships,
            tenants,
            cache,
            audit,
        }
    }

    /// Resolve, serving from the cache when possible
    pub async fn resolve(&self, user_id: UserId, tenant_id: TenantId) -> Result<Resolution, AuthError> {
        let key = (user_id, tenant_id);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                return Ok(hit);
            }
        }

        let resolution = self.resolve_fresh(user_id, tenant_id).await?;
        if let Some(cache) = &self.cache {
            cache.insert(key, resolution).await;
        }
        Ok(resolution)
    }

    /// Resolve against the stores, bypassing the cache
    pub async fn resolve_fresh(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> Result<Resolution, AuthError> {
        self.resolve_at(user_id, tenant_id, Utc::now()).await
    }

    /// Resolve as of `now`, bypassing the cache
    pub async fn resolve_at(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Resolution, AuthError> {
        // Membership first: a non-member learns nothing about tenant status.
        let membership = match self.memberships.find(user_id.0, tenant_id.0).await? {
            Some(m) if m.active => m,
            _ => return Ok(Resolution::Denied(IneligibleReason::NoMembership)),
        };

        let Some(tenant) = self.tenants.find_by_id(tenant_id.0).await? else {
            tracing::warn!(%tenant_id, %user_id, "membership references a missing tenant");
            return Ok(Resolution::Denied(IneligibleReason::NoMembership));
        };

        if let Err(reason) = tenant.to_tenant()?.check_standing(now) {
            return Ok(Resolution::Denied(reason));
        }

        Ok(Resolution::Granted(membership.role()?))
    }

    /// Drop any cached resolution for the pair
    pub async fn invalidate(&self, user_id: UserId, tenant_id: TenantId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&(user_id, tenant_id)).await;
        }
    }

    /// Drop every cached resolution
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Record a denied tenant access
    pub fn audit_denied(&self, user_id: UserId, tenant_id: TenantId, reason: IneligibleReason) {
        tracing::info!(%user_id, %tenant_id, reason = reason.code(), "tenant access denied");
        self.audit.record(AuditEvent::TenantAccessDenied {
            user_id,
            tenant_id,
            reason,
        });
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Add a member (or reactivate a removed one) to the caller's tenant
    pub async fn add_member(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
        role: Role,
    ) -> Result<MembershipRow, AuthError> {
        self.administer(ctx, MembershipChange::Add { user_id, role })
            .await
    }

    /// Change an existing member's role
    pub async fn change_role(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
        role: Role,
    ) -> Result<MembershipRow, AuthError> {
        self.administer(ctx, MembershipChange::ChangeRole { user_id, role })
            .await
    }

    /// Deactivate a member
    pub async fn remove_member(
        &self,
        ctx: &RequestSecurityContext,
        user_id: UserId,
    ) -> Result<MembershipRow, AuthError> {
        self.administer(ctx, MembershipChange::Remove { user_id })
            .await
    }

    /// List the caller's tenant members
    pub async fn list_members(
        &self,
        ctx: &RequestSecurityContext,
    ) -> Result<Vec<MembershipRow>, AuthError> {
        ctx.require_role(Role::Admin)?;
        Ok(self.memberships.list_for_tenant(ctx.tenant_id().0).await?)
    }

    async fn administer(
        &self,
        ctx: &RequestSecurityContext,
        change: MembershipChange,
    ) -> Result<MembershipRow, AuthError> {
        if let Err(denied) = ctx.require_role(Role::Admin) {
            self.audit.record(AuditEvent::InsufficientRole {
                user_id: ctx.user_id(),
                tenant_id: ctx.tenant_id(),
                required: denied.required,
                actual: denied.actual,
            });
            return Err(denied.into());
        }

        let tenant_id = ctx.tenant_id();
        let row = self.memberships.apply_change(tenant_id.0, change).await?;
        self.invalidate(change.user_id(), tenant_id).await;

        tracing::info!(
            actor = %ctx.user_id(),
            %tenant_id,
            member = %change.user_id(),
            change = %change.label(),
            "membership changed"
        );
        self.audit.record(AuditEvent::MembershipChanged {
            actor: ctx.user_id(),
            tenant_id,
            member: change.user_id(),
            change: change.label(),
        });
        Ok(row)
    }
}

impl std::fmt::Debug for MembershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipResolver")
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
