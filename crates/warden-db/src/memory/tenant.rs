//! In-memory tenant repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::TenantRow;
use crate::repo::{CreateTenant, TenantRepository};

/// In-memory tenant repository
#[derive(Default, Clone)]
pub struct MemoryTenantRepository {
    tenants: Arc<DashMap<Uuid, TenantRow>>,
}

impl MemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for MemoryTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<TenantRow>> {
        Ok(self.tenants.get(&id).map(|r| r.value().clone()))
    }

    async fn create(&self, tenant: CreateTenant) -> DbResult<TenantRow> {
        if self.tenants.contains_key(&tenant.id) {
            return Err(DbError::Conflict("tenant already exists".to_string()));
        }
        let row = TenantRow {
            id: tenant.id,
            name: tenant.name,
            status: tenant.status,
            trial_ends_at: tenant.trial_ends_at,
            grace_period_ends_at: tenant.grace_period_ends_at,
            created_at: Utc::now(),
        };
        self.tenants.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        trial_ends_at: Option<DateTime<Utc>>,
        grace_period_ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let mut tenant = self.tenants.get_mut(&id).ok_or(DbError::NotFound)?;
        tenant.status = status.to_string();
        tenant.trial_ends_at = trial_ends_at;
        tenant.grace_period_ends_at = grace_period_ends_at;
        Ok(())
    }
}
