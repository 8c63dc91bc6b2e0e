//! PostgreSQL refresh token repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use warden_types::RevocationReason;

use crate::error::DbResult;
use crate::models::RefreshTokenRow;
use crate::repo::{CreateRefreshToken, RefreshTokenRepository, RotateOutcome};

const COLUMNS: &str = "id, user_id, tenant_id, family_id, token_hash, expires_at, revoked, \
                       revoked_at, revoked_reason, replaced_by, ip_address, user_agent, created_at";

/// PostgreSQL refresh token repository
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    /// Create a new refresh token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn insert_sql() -> String {
    format!(
        r#"
        INSERT INTO refresh_tokens
            (id, user_id, tenant_id, family_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {COLUMNS}
        "#
    )
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<RefreshTokenRow>> {
        let sql = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE id = $1");
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_by_hash(&self, token_hash: &str) -> DbResult<Option<RefreshTokenRow>> {
        let sql = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn create(&self, token: CreateRefreshToken) -> DbResult<RefreshTokenRow> {
        let sql = insert_sql();
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(token.id)
            .bind(token.user_id)
            .bind(token.tenant_id)
            .bind(token.family_id)
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .bind(&token.ip_address)
            .bind(&token.user_agent)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn rotate(
        &self,
        old_id: Uuid,
        successor: CreateRefreshToken,
        now: DateTime<Utc>,
    ) -> DbResult<RotateOutcome> {
        // Dropping `tx` without commit rolls back, so an abandoned request
        // never leaves a half-rotated lineage behind.
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3, replaced_by = $4
            WHERE id = $1 AND NOT revoked
            "#,
        )
        .bind(old_id)
        .bind(now)
        .bind(RevocationReason::Rotated.as_str())
        .bind(successor.id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tracing::debug!(token_id = %old_id, "refresh token consumed concurrently");
            tx.rollback().await?;
            return Ok(RotateOutcome::AlreadyConsumed);
        }

        let sql = insert_sql();
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(successor.id)
            .bind(successor.user_id)
            .bind(successor.tenant_id)
            .bind(successor.family_id)
            .bind(&successor.token_hash)
            .bind(successor.expires_at)
            .bind(&successor.ip_address)
            .bind(&successor.user_agent)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RotateOutcome::Rotated(row))
    }

    async fn revoke(
        &self,
        id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE id = $1 AND NOT revoked
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE family_id = $1 AND NOT revoked
            "#,
        )
        .bind(family_id)
        .bind(now)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE user_id = $1 AND NOT revoked
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
