//! Per-request security context

use serde::Serialize;

use crate::{Role, TenantId, UserId};

/// Identity and tenant scope of the request being served.
///
/// Built once after the token is validated and the membership re-resolved,
/// then handed down by reference. Fields are private so handlers can read
/// but never rewrite the scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSecurityContext {
    user_id: UserId,
    tenant_id: TenantId,
    role: Role,
    system_bypass: bool,
    jti: Option<String>,
}

impl RequestSecurityContext {
    /// Context for an authenticated user request
    pub fn new(user_id: UserId, tenant_id: TenantId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            system_bypass: false,
            jti: None,
        }
    }

    /// Context for a verified system operation (retention jobs, migrations).
    ///
    /// Only system contexts may request an isolation bypass.
    pub fn system(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id,
            role: Role::Owner,
            system_bypass: true,
            jti: None,
        }
    }

    /// Attach the access token id for log correlation
    #[must_use]
    pub fn with_token_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_system(&self) -> bool {
        self.system_bypass
    }

    pub fn token_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    /// Check the role meets a minimum
    pub fn require_role(&self, required: Role) -> Result<(), InsufficientRole> {
        if self.role.satisfies(required) {
            Ok(())
        } else {
            Err(InsufficientRole {
                required,
                actual: self.role,
            })
        }
    }
}

/// The context's role is below what an operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("role {actual} does not satisfy {required}")]
pub struct InsufficientRole {
    pub required: Role,
    pub actual: Role,
}
