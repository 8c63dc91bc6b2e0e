//! In-memory user repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::UserRow;
use crate::repo::{CreateUser, UserRepository};

/// In-memory user repository
#[derive(Default, Clone)]
pub struct MemoryUserRepository {
    users: Arc<DashMap<Uuid, UserRow>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| self.users.get(id.value()).map(|r| r.value().clone())))
    }

    async fn create(&self, user: CreateUser) -> DbResult<UserRow> {
        let email = user.email.to_lowercase();
        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(DbError::Conflict("user already exists".to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }

        let now = Utc::now();
        let row = UserRow {
            id: user.id,
            email,
            password_hash: user.password_hash,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        let mut user = self.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DbResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.active = active;
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}
