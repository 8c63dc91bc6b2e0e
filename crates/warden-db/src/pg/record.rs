//! PostgreSQL record store implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::RecordRow;
use crate::repo::{NewRecord, RecordStore, Scope};

/// PostgreSQL store for tenant-owned records
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a new record store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<Option<RecordRow>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, tenant_id, collection, data, created_at, updated_at
            FROM records
            WHERE collection = $1 AND id = $2
              AND ($3::uuid IS NULL OR tenant_id = $3)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(scope.tenant())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list(&self, scope: Scope, collection: &str, limit: i64) -> DbResult<Vec<RecordRow>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, tenant_id, collection, data, created_at, updated_at
            FROM records
            WHERE collection = $1
              AND ($2::uuid IS NULL OR tenant_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(scope.tenant())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert(&self, record: NewRecord) -> DbResult<RecordRow> {
        sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO records (id, tenant_id, collection, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tenant_id, collection, data, created_at, updated_at
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(&record.collection)
        .bind(&record.data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "record"))
    }

    async fn update(
        &self,
        scope: Scope,
        collection: &str,
        id: Uuid,
        data: serde_json::Value,
    ) -> DbResult<Option<RecordRow>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            UPDATE records
            SET data = $1, updated_at = NOW()
            WHERE collection = $2 AND id = $3
              AND ($4::uuid IS NULL OR tenant_id = $4)
            RETURNING id, tenant_id, collection, data, created_at, updated_at
            "#,
        )
        .bind(&data)
        .bind(collection)
        .bind(id)
        .bind(scope.tenant())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, scope: Scope, collection: &str, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM records
            WHERE collection = $1 AND id = $2
              AND ($3::uuid IS NULL OR tenant_id = $3)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(scope.tenant())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
