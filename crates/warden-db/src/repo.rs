//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use warden_types::{RevocationReason, TenantId};

use crate::error::DbResult;
use crate::models::*;
use crate::rules::MembershipChange;

// =============================================================================
// Users, tenants, memberships
// =============================================================================

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;

    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>>;

    /// Create a new user
    async fn create(&self, user: CreateUser) -> DbResult<UserRow>;

    /// Replace the stored password hash
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()>;

    /// Activate or deactivate a user
    async fn set_active(&self, id: Uuid, active: bool) -> DbResult<()>;
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Tenant repository trait
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Find a tenant by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<TenantRow>>;

    /// Create a new tenant
    async fn create(&self, tenant: CreateTenant) -> DbResult<TenantRow>;

    /// Update subscription status and period boundaries
    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        trial_ends_at: Option<DateTime<Utc>>,
        grace_period_ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()>;
}

/// Create tenant input
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
}

/// Membership repository trait
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Find the membership for a (user, tenant) pair, active or not
    async fn find(&self, user_id: Uuid, tenant_id: Uuid) -> DbResult<Option<MembershipRow>>;

    /// All memberships of a tenant
    async fn list_for_tenant(&self, tenant_id: Uuid) -> DbResult<Vec<MembershipRow>>;

    /// Active memberships of a user
    async fn list_active_for_user(&self, user_id: Uuid) -> DbResult<Vec<MembershipRow>>;

    /// Insert a membership row directly (tenant provisioning).
    ///
    /// Enforces uniqueness of (user, tenant) and of the tenant owner but not
    /// the administration rules; use [`apply_change`](Self::apply_change)
    /// for those.
    async fn create(&self, membership: CreateMembership) -> DbResult<MembershipRow>;

    /// Validate and apply an administrative change while holding the
    /// tenant's membership rows exclusively
    async fn apply_change(
        &self,
        tenant_id: Uuid,
        change: MembershipChange,
    ) -> DbResult<MembershipRow>;
}

/// Create membership input
#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
}

// =============================================================================
// Credential store
// =============================================================================

/// Refresh token repository trait
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Find a token by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<RefreshTokenRow>>;

    /// Find a token by hash, whatever its state
    async fn find_by_hash(&self, token_hash: &str) -> DbResult<Option<RefreshTokenRow>>;

    /// Persist a newly issued token
    async fn create(&self, token: CreateRefreshToken) -> DbResult<RefreshTokenRow>;

    /// Atomically consume `old_id` and insert its successor.
    ///
    /// The old row is revoked only if it is still unrevoked; when another
    /// rotation got there first nothing is written and
    /// [`RotateOutcome::AlreadyConsumed`] is returned.
    async fn rotate(
        &self,
        old_id: Uuid,
        successor: CreateRefreshToken,
        now: DateTime<Utc>,
    ) -> DbResult<RotateOutcome>;

    /// Revoke one token. Returns false if it was already revoked or absent.
    async fn revoke(&self, id: Uuid, reason: RevocationReason, now: DateTime<Utc>)
        -> DbResult<bool>;

    /// Revoke every unrevoked token in a family
    async fn revoke_family(
        &self,
        family_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64>;

    /// Revoke every unrevoked token of a user
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64>;

    /// Physically delete tokens that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<u64>;
}

/// Create refresh token input
#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub family_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of [`RefreshTokenRepository::rotate`]
#[derive(Debug, Clone)]
pub enum RotateOutcome {
    /// Old token revoked, successor stored
    Rotated(RefreshTokenRow),
    /// The old token was already revoked by the time the update ran
    AlreadyConsumed,
}

/// Login attempt repository trait
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    /// Append an attempt and return the pair's failure tally including it.
    ///
    /// Recording and tallying are serialized per (email, ip) so concurrent
    /// failures are never both tallied against the same prior count.
    async fn record(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary>;

    /// Return the pair's failure tally, then append an attempt still being
    /// decided.
    ///
    /// Runs under the same per-pair serialization as [`record`](Self::record).
    /// The reserved row counts as a failure until [`settle`](Self::settle)
    /// rewrites it, so each concurrent reservation sees every one ahead of it.
    async fn reserve(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary>;

    /// Set the final outcome of a reserved attempt
    async fn settle(&self, id: Uuid, success: bool, failure_reason: Option<&str>) -> DbResult<()>;

    /// Failures for the pair since its last success (and since
    /// `window_start`, if given), excluding `account_locked` rejections
    async fn summary(
        &self,
        email: &str,
        ip_address: &str,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary>;

    /// Delete attempts older than `cutoff`
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64>;
}

/// Failure reason recorded for attempts rejected by an active lockout
pub const LOCKED_REASON: &str = "account_locked";

/// Failure reason of a reserved attempt that has not been settled yet
pub const PENDING_REASON: &str = "pending";

/// New login attempt input
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub id: Uuid,
    pub email: String,
    pub ip_address: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

// =============================================================================
// Tenant-owned records
// =============================================================================

/// Tenant predicate applied to a record query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only rows owned by this tenant
    Tenant(TenantId),
    /// No tenant predicate (system jobs, explicit bypass)
    Unscoped,
}

impl Scope {
    /// Tenant filter as a bindable value
    pub fn tenant(&self) -> Option<Uuid> {
        match self {
            Self::Tenant(id) => Some(id.0),
            Self::Unscoped => None,
        }
    }

    /// Whether a row owned by `owner` is visible in this scope
    pub fn admits(&self, owner: Uuid) -> bool {
        self.tenant().map_or(true, |t| t == owner)
    }
}

/// Storage for tenant-owned records.
///
/// Every read and write takes a [`Scope`]; callers reach this only through
/// the isolation guard.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record
    async fn get(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<Option<RecordRow>>;

    /// List records, newest first
    async fn list(&self, scope: Scope, collection: &str, limit: i64) -> DbResult<Vec<RecordRow>>;

    /// Insert a record owned by `record.tenant_id`
    async fn insert(&self, record: NewRecord) -> DbResult<RecordRow>;

    /// Replace a record's data. The owning tenant is never changed here.
    async fn update(
        &self,
        scope: Scope,
        collection: &str,
        id: Uuid,
        data: serde_json::Value,
    ) -> DbResult<Option<RecordRow>>;

    /// Delete a record. Returns false if nothing in scope matched.
    async fn delete(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<bool>;
}

/// New record input
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub collection: String,
    pub data: serde_json::Value,
}
