//! Warden DB - Storage layer
//!
//! Repository traits for users, tenants, memberships, refresh tokens, login
//! attempts and tenant-owned records, with a PostgreSQL implementation
//! (sqlx) and an in-memory implementation for tests and local development.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_db::{create_pool, Stores};
//!
//! let pool = create_pool("postgres://localhost/warden").await?;
//! warden_db::run_migrations(&pool).await?;
//! let stores = Stores::postgres(pool);
//!
//! let user = stores.users.find_by_email("a@x.com").await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;
pub mod rules;

pub use error::{DbError, DbResult};
pub use memory::MemoryStores;
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;
pub use rules::{check_membership_change, MembershipChange, MembershipRule};

use std::sync::Arc;

/// Repository handles used by the auth core, independent of backend
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub tenants: Arc<dyn TenantRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub login_attempts: Arc<dyn LoginAttemptRepository>,
}

impl Stores {
    /// PostgreSQL-backed stores
    pub fn postgres(pool: DbPool) -> Self {
        let repos = Repositories::new(pool);
        Self {
            users: Arc::new(repos.users),
            tenants: Arc::new(repos.tenants),
            memberships: Arc::new(repos.memberships),
            refresh_tokens: Arc::new(repos.refresh_tokens),
            login_attempts: Arc::new(repos.login_attempts),
        }
    }

    /// Stores backed by the given in-memory repositories
    pub fn memory(repos: &MemoryStores) -> Self {
        Self {
            users: Arc::new(repos.users.clone()),
            tenants: Arc::new(repos.tenants.clone()),
            memberships: Arc::new(repos.memberships.clone()),
            refresh_tokens: Arc::new(repos.refresh_tokens.clone()),
            login_attempts: Arc::new(repos.login_attempts.clone()),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
