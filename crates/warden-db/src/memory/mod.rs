//! In-memory repository implementations
//!
//! Same contracts as the PostgreSQL repositories, including the atomic
//! rotation and the per-pair serialization of login attempts. Used by tests
//! and by `auth-api` when no `DATABASE_URL` is configured.

mod login_attempt;
mod membership;
mod record;
mod refresh_token;
mod tenant;
mod user;

pub use login_attempt::MemoryLoginAttemptRepository;
pub use membership::MemoryMembershipRepository;
pub use record::MemoryRecordStore;
pub use refresh_token::MemoryRefreshTokenRepository;
pub use tenant::MemoryTenantRepository;
pub use user::MemoryUserRepository;

/// All in-memory repositories bundled together
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub users: MemoryUserRepository,
    pub tenants: MemoryTenantRepository,
    pub memberships: MemoryMembershipRepository,
    pub refresh_tokens: MemoryRefreshTokenRepository,
    pub login_attempts: MemoryLoginAttemptRepository,
    pub records: MemoryRecordStore,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}
