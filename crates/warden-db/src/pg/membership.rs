//! PostgreSQL membership repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::MembershipRow;
use crate::repo::{CreateMembership, MembershipRepository};
use crate::rules::{check_membership_change, MembershipChange};

/// PostgreSQL membership repository
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    /// Create a new membership repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find(&self, user_id: Uuid, tenant_id: Uuid) -> DbResult<Option<MembershipRow>> {
        let membership = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, tenant_id, role, active, created_at, updated_at
            FROM memberships
            WHERE user_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> DbResult<Vec<MembershipRow>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, tenant_id, role, active, created_at, updated_at
            FROM memberships
            WHERE tenant_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> DbResult<Vec<MembershipRow>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, tenant_id, role, active, created_at, updated_at
            FROM memberships
            WHERE user_id = $1 AND active
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create(&self, membership: CreateMembership) -> DbResult<MembershipRow> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            INSERT INTO memberships (id, user_id, tenant_id, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, tenant_id, role, active, created_at, updated_at
            "#,
        )
        .bind(membership.id)
        .bind(membership.user_id)
        .bind(membership.tenant_id)
        .bind(&membership.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "membership"))
    }

    async fn apply_change(
        &self,
        tenant_id: Uuid,
        change: MembershipChange,
    ) -> DbResult<MembershipRow> {
        let mut tx = self.pool.begin().await?;

        // Concurrent admin changes on one tenant queue behind this lock.
        let members = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, user_id, tenant_id, role, active, created_at, updated_at
            FROM memberships
            WHERE tenant_id = $1
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;

        check_membership_change(&members, &change)?;

        let row = match change {
            MembershipChange::Add { user_id, role } => {
                sqlx::query_as::<_, MembershipRow>(
                    r#"
                    INSERT INTO memberships (id, user_id, tenant_id, role)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id, tenant_id)
                    DO UPDATE SET role = EXCLUDED.role, active = TRUE, updated_at = NOW()
                    RETURNING id, user_id, tenant_id, role, active, created_at, updated_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id.0)
                .bind(tenant_id)
                .bind(role.as_str())
                .fetch_one(&mut *tx)
                .await?
            }
            MembershipChange::ChangeRole { user_id, role } => {
                sqlx::query_as::<_, MembershipRow>(
                    r#"
                    UPDATE memberships
                    SET role = $1, updated_at = NOW()
                    WHERE user_id = $2 AND tenant_id = $3
                    RETURNING id, user_id, tenant_id, role, active, created_at, updated_at
                    "#,
                )
                .bind(role.as_str())
                .bind(user_id.0)
                .bind(tenant_id)
                .fetch_one(&mut *tx)
                .await?
            }
            MembershipChange::Remove { user_id } => {
                sqlx::query_as::<_, MembershipRow>(
                    r#"
                    UPDATE memberships
                    SET active = FALSE, updated_at = NOW()
                    WHERE user_id = $1 AND tenant_id = $2
                    RETURNING id, user_id, tenant_id, role, active, created_at, updated_at
                    "#,
                )
                .bind(user_id.0)
                .bind(tenant_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(row)
    }
}
