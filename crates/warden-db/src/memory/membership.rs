//! In-memory membership repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use warden_types::Role;

use crate::error::{DbError, DbResult};
use crate::models::MembershipRow;
use crate::repo::{CreateMembership, MembershipRepository};
use crate::rules::{check_membership_change, MembershipChange};

/// In-memory membership repository.
///
/// A single lock over all rows stands in for the per-tenant row locks of
/// the PostgreSQL implementation.
#[derive(Default, Clone)]
pub struct MemoryMembershipRepository {
    rows: Arc<Mutex<Vec<MembershipRow>>>,
}

impl MemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRepository for MemoryMembershipRepository {
    async fn find(&self, user_id: Uuid, tenant_id: Uuid) -> DbResult<Option<MembershipRow>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> DbResult<Vec<MembershipRow>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().filter(|m| m.tenant_id == tenant_id).cloned().collect())
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> DbResult<Vec<MembershipRow>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|m| m.user_id == user_id && m.active)
            .cloned()
            .collect())
    }

    async fn create(&self, membership: CreateMembership) -> DbResult<MembershipRow> {
        let mut rows = self.rows.lock().await;

        let duplicate = rows
            .iter()
            .any(|m| m.user_id == membership.user_id && m.tenant_id == membership.tenant_id);
        if duplicate {
            return Err(DbError::Conflict("membership already exists".to_string()));
        }
        let second_owner = membership.role == Role::Owner.as_str()
            && rows.iter().any(|m| {
                m.tenant_id == membership.tenant_id && m.active && m.role == Role::Owner.as_str()
            });
        if second_owner {
            return Err(DbError::Conflict("tenant already has an owner".to_string()));
        }

        let now = Utc::now();
        let row = MembershipRow {
            id: membership.id,
            user_id: membership.user_id,
            tenant_id: membership.tenant_id,
            role: membership.role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn apply_change(
        &self,
        tenant_id: Uuid,
        change: MembershipChange,
    ) -> DbResult<MembershipRow> {
        let mut rows = self.rows.lock().await;

        let members: Vec<MembershipRow> =
            rows.iter().filter(|m| m.tenant_id == tenant_id).cloned().collect();
        check_membership_change(&members, &change)?;

        let user_id = change.user_id().0;
        let now = Utc::now();
        let existing = rows
            .iter_mut()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id);

        match (change, existing) {
            (MembershipChange::Add { role, .. }, Some(row)) => {
                row.role = role.as_str().to_string();
                row.active = true;
                row.updated_at = now;
                Ok(row.clone())
            }
            (MembershipChange::Add { role, .. }, None) => {
                let row = MembershipRow {
                    id: Uuid::new_v4(),
                    user_id,
                    tenant_id,
                    role: role.as_str().to_string(),
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                rows.push(row.clone());
                Ok(row)
            }
            (MembershipChange::ChangeRole { role, .. }, Some(row)) => {
                row.role = role.as_str().to_string();
                row.updated_at = now;
                Ok(row.clone())
            }
            (MembershipChange::Remove { .. }, Some(row)) => {
                row.active = false;
                row.updated_at = now;
                Ok(row.clone())
            }
            (_, None) => Err(DbError::NotFound),
        }
    }
}
