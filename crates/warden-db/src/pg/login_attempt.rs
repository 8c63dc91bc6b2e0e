//! PostgreSQL login attempt repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::AttemptSummary;
use crate::repo::{LoginAttemptRepository, NewLoginAttempt, LOCKED_REASON};

/// Failures since the pair's last success, optionally bounded by a window
const SUMMARY_SQL: &str = r#"
    WITH last_success AS (
        SELECT MAX(attempted_at) AS at
        FROM login_attempts
        WHERE email = $1 AND ip_address = $2 AND success
    )
    SELECT COUNT(*) AS failures, MAX(a.attempted_at) AS last_failure_at
    FROM login_attempts a, last_success s
    WHERE a.email = $1
      AND a.ip_address = $2
      AND NOT a.success
      AND a.failure_reason IS DISTINCT FROM $3
      AND (s.at IS NULL OR a.attempted_at > s.at)
      AND ($4::timestamptz IS NULL OR a.attempted_at >= $4)
"#;

/// PostgreSQL login attempt repository
#[derive(Clone)]
pub struct PgLoginAttemptRepository {
    pool: PgPool,
}

impl PgLoginAttemptRepository {
    /// Create a new login attempt repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn summarize<'e, E>(
    executor: E,
    email: &str,
    ip_address: &str,
    window_start: Option<DateTime<Utc>>,
) -> DbResult<AttemptSummary>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let summary = sqlx::query_as::<_, AttemptSummary>(SUMMARY_SQL)
        .bind(email)
        .bind(ip_address)
        .bind(LOCKED_REASON)
        .bind(window_start)
        .fetch_one(executor)
        .await?;

    Ok(summary)
}

/// Open a transaction holding the pair's advisory lock
async fn lock_pair(
    pool: &PgPool,
    email: &str,
    ip_address: &str,
) -> DbResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;

    // Released at commit/rollback; serializes writers for this pair only.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("login:{email}|{ip_address}"))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

async fn insert(tx: &mut Transaction<'static, Postgres>, attempt: &NewLoginAttempt) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO login_attempts
            (id, email, ip_address, success, failure_reason, attempted_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(attempt.id)
    .bind(&attempt.email)
    .bind(&attempt.ip_address)
    .bind(attempt.success)
    .bind(&attempt.failure_reason)
    .bind(attempt.attempted_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl LoginAttemptRepository for PgLoginAttemptRepository {
    async fn record(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        let mut tx = lock_pair(&self.pool, &attempt.email, &attempt.ip_address).await?;
        insert(&mut tx, &attempt).await?;
        let summary = summarize(&mut *tx, &attempt.email, &attempt.ip_address, window_start).await?;
        tx.commit().await?;
        Ok(summary)
    }

    async fn reserve(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        let mut tx = lock_pair(&self.pool, &attempt.email, &attempt.ip_address).await?;
        let prior = summarize(&mut *tx, &attempt.email, &attempt.ip_address, window_start).await?;
        insert(&mut tx, &attempt).await?;
        tx.commit().await?;
        Ok(prior)
    }

    async fn settle(&self, id: Uuid, success: bool, failure_reason: Option<&str>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE login_attempts SET success = $2, failure_reason = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(success)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(attempt_id = %id, "reserved login attempt vanished before settling");
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn summary(
        &self,
        email: &str,
        ip_address: &str,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        summarize(&self.pool, email, ip_address, window_start).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
