//! Isolation errors

use thiserror::Error;
use warden_db::DbError;

/// Errors raised while enforcing tenant isolation
#[derive(Error, Debug)]
pub enum IsolationError {
    /// Strict mode and no tenant context
    #[error("tenant context missing")]
    TenantContextMissing,

    /// Absent, or owned by another tenant
    #[error("record not found")]
    NotFound,

    /// Update tried to move a record to another tenant
    #[error("tenant_id cannot be changed")]
    TenantIdImmutable,

    /// Insert named a tenant other than the caller's
    #[error("cannot write records for another tenant")]
    CrossTenantWrite,

    /// Bypass not allowed for this caller or configuration
    #[error("isolation bypass denied")]
    BypassDenied,

    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl IsolationError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TenantContextMissing => 401,
            Self::NotFound => 404,
            Self::TenantIdImmutable => 422,
            Self::CrossTenantWrite | Self::BypassDenied => 403,
            Self::Store(DbError::Conflict(_)) => 409,
            Self::Store(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TenantContextMissing => "TENANT_CONTEXT_MISSING",
            Self::NotFound => "NOT_FOUND",
            Self::TenantIdImmutable => "TENANT_ID_IMMUTABLE",
            Self::CrossTenantWrite => "CROSS_TENANT_WRITE",
            Self::BypassDenied => "BYPASS_DENIED",
            Self::Store(DbError::Conflict(_)) => "CONFLICT",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}
