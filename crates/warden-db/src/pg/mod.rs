//! PostgreSQL repository implementations

mod login_attempt;
mod membership;
mod record;
mod refresh_token;
mod tenant;
mod user;

pub use login_attempt::PgLoginAttemptRepository;
pub use membership::PgMembershipRepository;
pub use record::PgRecordStore;
pub use refresh_token::PgRefreshTokenRepository;
pub use tenant::PgTenantRepository;
pub use user::PgUserRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub users: PgUserRepository,
    pub tenants: PgTenantRepository,
    pub memberships: PgMembershipRepository,
    pub refresh_tokens: PgRefreshTokenRepository,
    pub login_attempts: PgLoginAttemptRepository,
    pub records: PgRecordStore,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            tenants: PgTenantRepository::new(pool.clone()),
            memberships: PgMembershipRepository::new(pool.clone()),
            refresh_tokens: PgRefreshTokenRepository::new(pool.clone()),
            login_attempts: PgLoginAttemptRepository::new(pool.clone()),
            records: PgRecordStore::new(pool),
        }
    }
}
