//! Application state

use std::sync::Arc;

use warden_auth_core::{AuthError, AuthService};
use warden_db::memory::MemoryStores;
use warden_db::pg::PgRecordStore;
use warden_db::{DbPool, RecordStore, Stores};
use warden_isolation::IsolationGuard;
use warden_types::{SharedAuditSink, TracingAuditSink};

use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Auth service for login, rotation and request contexts
    pub auth: AuthService,
    /// Tenant-scoped access to records
    pub records: IsolationGuard<dyn RecordStore>,
    /// Database pool; absent when running on in-memory stores
    pub pool: Option<DbPool>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn postgres(pool: DbPool, config: Config) -> Result<Self, AuthError> {
        let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
        Self::build(Stores::postgres(pool.clone()), records, Some(pool), config)
    }

    /// State backed by in-memory stores (local development and tests)
    pub fn memory(stores: &MemoryStores, config: Config) -> Result<Self, AuthError> {
        let records: Arc<dyn RecordStore> = Arc::new(stores.records.clone());
        Self::build(Stores::memory(stores), records, None, config)
    }

    fn build(
        stores: Stores,
        records: Arc<dyn RecordStore>,
        pool: Option<DbPool>,
        config: Config,
    ) -> Result<Self, AuthError> {
        let audit: SharedAuditSink = Arc::new(TracingAuditSink);
        Self::with_audit(stores, records, pool, config, audit)
    }

    /// State with an explicit audit sink
    pub fn with_audit(
        stores: Stores,
        records: Arc<dyn RecordStore>,
        pool: Option<DbPool>,
        config: Config,
        audit: SharedAuditSink,
    ) -> Result<Self, AuthError> {
        let auth = AuthService::new(config.auth.clone(), stores, Arc::clone(&audit))?;
        let records = IsolationGuard::new(records, config.isolation, audit);
        Ok(Self {
            auth,
            records,
            pool,
            config: Arc::new(config),
        })
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("database", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}
