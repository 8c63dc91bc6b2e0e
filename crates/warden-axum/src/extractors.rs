//! Axum extractors for the request security context.
//!
//! Both extractors read what [`SecurityLayer`](crate::SecurityLayer) left in
//! the request extensions; they never look at headers themselves.
//!
//! # Usage
//!
//! ```ignore
//! use warden_axum::{RequireRole, SecurityContext, roles};
//!
//! // Any member of the tenant (401 without a context)
//! async fn dashboard(ctx: SecurityContext) -> String {
//!     format!("tenant {}", ctx.tenant_id())
//! }
//!
//! // Finance or above (403 otherwise)
//! async fn invoices(ctx: RequireRole<roles::Finance>) -> String {
//!     format!("{} may see invoices", ctx.user_id())
//! }
//! ```

use std::marker::PhantomData;
use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use warden_auth_core::AuthError;
use warden_types::{AuditEvent, RequestSecurityContext, Role, SharedAuditSink};

use crate::error::ApiError;

/// Audit sink handed to extractors by the middleware
#[derive(Clone)]
pub struct AuditHandle(pub SharedAuditSink);

/// The authenticated tenant context of this request.
///
/// Returns 401 `TENANT_CONTEXT_MISSING` if the middleware did not run.
#[derive(Debug, Clone)]
pub struct SecurityContext(pub RequestSecurityContext);

impl Deref for SecurityContext {
    type Target = RequestSecurityContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for SecurityContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSecurityContext>()
            .cloned()
            .map(Self)
            .ok_or(ApiError::Auth(AuthError::TenantContextMissing))
    }
}

// =============================================================================
// Role gates
// =============================================================================

/// Minimum role for a [`RequireRole`] extractor
pub trait RoleBound: Send + Sync + 'static {
    const ROLE: Role;
}

/// Role markers for [`RequireRole`]
pub mod roles {
    use super::RoleBound;
    use warden_types::Role;

    macro_rules! role_marker {
        ($($name:ident => $role:expr),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy)]
                pub struct $name;

                impl RoleBound for $name {
                    const ROLE: Role = $role;
                }
            )*
        };
    }

    role_marker! {
        Owner => Role::Owner,
        Admin => Role::Admin,
        Finance => Role::Finance,
        Sales => Role::Sales,
        Warehouse => Role::Warehouse,
        Staff => Role::Staff,
    }
}

/// Extractor that requires a minimum role in the current tenant.
///
/// Returns 401 without a context and 403 `INSUFFICIENT_ROLE` when the
/// role falls short. Rejections are audited.
pub struct RequireRole<R: RoleBound> {
    ctx: RequestSecurityContext,
    _role: PhantomData<R>,
}

impl<R: RoleBound> RequireRole<R> {
    pub fn into_inner(self) -> RequestSecurityContext {
        self.ctx
    }
}

impl<R: RoleBound> std::fmt::Debug for RequireRole<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequireRole")
            .field("required", &R::ROLE)
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<R: RoleBound> Deref for RequireRole<R> {
    type Target = RequestSecurityContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    R: RoleBound,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SecurityContext(ctx) = SecurityContext::from_request_parts(parts, state).await?;

        if let Err(denied) = ctx.require_role(R::ROLE) {
            tracing::info!(
                user_id = %ctx.user_id(),
                tenant_id = %ctx.tenant_id(),
                required = %denied.required,
                actual = %denied.actual,
                "role requirement not met"
            );
            if let Some(AuditHandle(audit)) = parts.extensions.get::<AuditHandle>() {
                audit.record(AuditEvent::InsufficientRole {
                    user_id: ctx.user_id(),
                    tenant_id: ctx.tenant_id(),
                    required: denied.required,
                    actual: denied.actual,
                });
            }
            return Err(ApiError::Auth(denied.into()));
        }

        Ok(Self {
            ctx,
            _role: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::http::{Request, StatusCode};
    use warden_types::{MemoryAuditSink, TenantId, UserId};

    fn parts_with(ctx: Option<RequestSecurityContext>, audit: &Arc<MemoryAuditSink>) -> Parts {
        let mut req = Request::builder().uri("/").body(()).unwrap();
        if let Some(ctx) = ctx {
            req.extensions_mut().insert(ctx);
        }
        req.extensions_mut().insert(AuditHandle(audit.clone()));
        req.into_parts().0
    }

    fn ctx(role: Role) -> RequestSecurityContext {
        RequestSecurityContext::new(UserId::new(), TenantId::new(), role)
    }

    #[tokio::test]
    async fn test_security_context_missing() {
        let audit = Arc::new(MemoryAuditSink::new());
        let mut parts = parts_with(None, &audit);
        let err = SecurityContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "TENANT_CONTEXT_MISSING");
    }

    #[tokio::test]
    async fn test_require_role_allows_higher_rank() {
        let audit = Arc::new(MemoryAuditSink::new());
        let mut parts = parts_with(Some(ctx(Role::Owner)), &audit);
        let gate = RequireRole::<roles::Finance>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(gate.role(), Role::Owner);
        assert_eq!(audit.count("insufficient_role"), 0);
    }

    #[tokio::test]
    async fn test_require_role_rejects_other_department() {
        let audit = Arc::new(MemoryAuditSink::new());
        let mut parts = parts_with(Some(ctx(Role::Sales)), &audit);
        let err = RequireRole::<roles::Finance>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "INSUFFICIENT_ROLE");
        assert_eq!(audit.count("insufficient_role"), 1);
    }

    #[tokio::test]
    async fn test_staff_gate_admits_every_member() {
        let audit = Arc::new(MemoryAuditSink::new());
        for role in Role::ALL {
            let mut parts = parts_with(Some(ctx(role)), &audit);
            assert!(RequireRole::<roles::Staff>::from_request_parts(&mut parts, &())
                .await
                .is_ok());
        }
    }
}
