//! PostgreSQL tenant repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::TenantRow;
use crate::repo::{CreateTenant, TenantRepository};

/// PostgreSQL tenant repository
#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    /// Create a new tenant repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<TenantRow>> {
        let tenant = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, name, status, trial_ends_at, grace_period_ends_at, created_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn create(&self, tenant: CreateTenant) -> DbResult<TenantRow> {
        sqlx::query_as::<_, TenantRow>(
            r#"
            INSERT INTO tenants (id, name, status, trial_ends_at, grace_period_ends_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, status, trial_ends_at, grace_period_ends_at, created_at
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.status)
        .bind(tenant.trial_ends_at)
        .bind(tenant.grace_period_ends_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "tenant"))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        trial_ends_at: Option<DateTime<Utc>>,
        grace_period_ends_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET status = $1, trial_ends_at = $2, grace_period_ends_at = $3
            WHERE id = $4
            "#,
        )
        .bind(status)
        .bind(trial_ends_at)
        .bind(grace_period_ends_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
