//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use warden_types::{
    MembershipId, RefreshTokenId, RevocationReason, Role, SubscriptionStatus, Tenant, TenantId,
    TokenFamilyId, UserId,
};

use crate::error::DbResult;

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant row from the database
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Membership row from the database
#[derive(Debug, Clone, FromRow)]
pub struct MembershipRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Refresh token row from the database
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub family_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub replaced_by: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Login attempt row from the database
#[derive(Debug, Clone, FromRow)]
pub struct LoginAttemptRow {
    pub id: Uuid,
    pub email: String,
    pub ip_address: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Tenant-owned record row from the database
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct RecordRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub collection: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Failure tally for one (email, ip) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct AttemptSummary {
    /// Failures counted towards lockout
    pub failures: i64,
    /// Timestamp of the most recent counted failure
    pub last_failure_at: Option<DateTime<Utc>>,
}

// Conversion implementations from Row types to warden-types domain types
impl UserRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }
}

impl TenantRow {
    /// Convert to the domain tenant used for standing checks
    pub fn to_tenant(&self) -> DbResult<Tenant> {
        Ok(Tenant {
            id: TenantId(self.id),
            name: self.name.clone(),
            status: self.status.parse::<SubscriptionStatus>()?,
            trial_ends_at: self.trial_ends_at,
            grace_period_ends_at: self.grace_period_ends_at,
        })
    }
}

impl MembershipRow {
    pub fn membership_id(&self) -> MembershipId {
        MembershipId(self.id)
    }

    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }

    pub fn tenant_id(&self) -> TenantId {
        TenantId(self.tenant_id)
    }

    /// Decode the stored role
    pub fn role(&self) -> DbResult<Role> {
        Ok(self.role.parse::<Role>()?)
    }
}

impl RefreshTokenRow {
    pub fn token_id(&self) -> RefreshTokenId {
        RefreshTokenId(self.id)
    }

    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }

    pub fn tenant_id(&self) -> TenantId {
        TenantId(self.tenant_id)
    }

    pub fn family_id(&self) -> TokenFamilyId {
        TokenFamilyId(self.family_id)
    }

    /// Decode the revocation reason, if revoked
    pub fn revocation_reason(&self) -> DbResult<Option<RevocationReason>> {
        self.revoked_reason
            .as_deref()
            .map(|r| r.parse::<RevocationReason>().map_err(Into::into))
            .transpose()
    }

    /// Whether the token is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl RecordRow {
    pub fn tenant_id(&self) -> TenantId {
        TenantId(self.tenant_id)
    }
}
