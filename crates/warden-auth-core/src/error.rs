//! Auth errors

use std::time::Duration;

use thiserror::Error;
use warden_db::{DbError, MembershipRule};
use warden_types::{IneligibleReason, Role};

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password (never says which)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Too many failures for this (email, ip)
    #[error("account locked, retry after {}s", retry_after.as_secs())]
    AccountLocked { retry_after: Duration },

    /// Authenticated, but not allowed into the tenant
    #[error("tenant access denied: {reason}")]
    TenantIneligible { reason: IneligibleReason },

    /// Malformed token, bad signature, wrong type or unknown refresh token
    #[error("invalid token")]
    TokenInvalid,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// Refresh token was revoked
    #[error("token revoked")]
    TokenRevoked,

    /// A consumed refresh token was presented again; its lineage is revoked
    #[error("token replay detected")]
    TokenReplayDetected,

    /// No authenticated tenant context on a request that needs one
    #[error("tenant context missing")]
    TenantContextMissing,

    /// Caller's role is below the required minimum
    #[error("insufficient role: {required} required")]
    InsufficientRole { required: Role, actual: Role },

    /// Target user has no membership in the tenant
    #[error("membership not found")]
    MembershipNotFound,

    /// Membership change rejected by a tenant invariant
    #[error("{0}")]
    MembershipRule(MembershipRule),

    /// An I/O step missed its deadline; safe to retry
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenRevoked
            | Self::TokenReplayDetected
            | Self::TenantContextMissing => 401,
            Self::TenantIneligible { .. } | Self::InsufficientRole { .. } => 403,
            Self::MembershipNotFound => 404,
            Self::MembershipRule(_) => 409,
            Self::AccountLocked { .. } => 429,
            Self::Timeout(_) => 503,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::TenantIneligible { reason } => reason.code(),
            Self::TokenInvalid => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::TokenReplayDetected => "TOKEN_REPLAY_DETECTED",
            Self::TenantContextMissing => "TENANT_CONTEXT_MISSING",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::MembershipNotFound => "MEMBERSHIP_NOT_FOUND",
            Self::MembershipRule(MembershipRule::LastAdmin) => "LAST_ADMIN",
            Self::MembershipRule(MembershipRule::OwnerImmutable) => "OWNER_IMMUTABLE",
            Self::MembershipRule(MembershipRule::OwnerNotGrantable) => "OWNER_NOT_GRANTABLE",
            Self::MembershipRule(MembershipRule::AlreadyMember) => "ALREADY_MEMBER",
            Self::MembershipRule(MembershipRule::NotMember) => "MEMBERSHIP_NOT_FOUND",
            Self::Timeout(_) => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Lockout remainder, for the `Retry-After` header
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::AccountLocked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::MembershipRule(MembershipRule::NotMember) => Self::MembershipNotFound,
            DbError::MembershipRule(rule) => Self::MembershipRule(rule),
            other => {
                tracing::error!(error = ?other, "database error");
                Self::Database(other.to_string())
            }
        }
    }
}

impl From<warden_types::InsufficientRole> for AuthError {
    fn from(err: warden_types::InsufficientRole) -> Self {
        Self::InsufficientRole {
            required: err.required,
            actual: err.actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::TokenReplayDetected.status_code(), 401);
        assert_eq!(
            AuthError::AccountLocked {
                retry_after: Duration::from_secs(60)
            }
            .status_code(),
            429
        );
        assert_eq!(
            AuthError::TenantIneligible {
                reason: IneligibleReason::TenantSuspended
            }
            .status_code(),
            403
        );
        assert_eq!(AuthError::Timeout("lockout check").status_code(), 503);
    }

    #[test]
    fn test_ineligible_code_is_specific() {
        let err = AuthError::TenantIneligible {
            reason: IneligibleReason::NoMembership,
        };
        assert_eq!(err.error_code(), "MEMBERSHIP_NOT_FOUND");
    }

    #[test]
    fn test_membership_rule_conversion() {
        let err: AuthError = DbError::MembershipRule(MembershipRule::LastAdmin).into();
        assert!(matches!(err, AuthError::MembershipRule(MembershipRule::LastAdmin)));
        let err: AuthError = DbError::MembershipRule(MembershipRule::NotMember).into();
        assert!(matches!(err, AuthError::MembershipNotFound));
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(AuthError::Timeout("rotation").is_retryable());
        assert!(!AuthError::TokenExpired.is_retryable());
    }
}
