//! In-memory refresh token repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;
use warden_types::RevocationReason;

use crate::error::{DbError, DbResult};
use crate::models::RefreshTokenRow;
use crate::repo::{CreateRefreshToken, RefreshTokenRepository, RotateOutcome};

/// In-memory refresh token repository
#[derive(Default, Clone)]
pub struct MemoryRefreshTokenRepository {
    tokens: Arc<Mutex<HashMap<Uuid, RefreshTokenRow>>>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, revoked or not
    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }
}

fn new_row(token: CreateRefreshToken) -> RefreshTokenRow {
    RefreshTokenRow {
        id: token.id,
        user_id: token.user_id,
        tenant_id: token.tenant_id,
        family_id: token.family_id,
        token_hash: token.token_hash,
        expires_at: token.expires_at,
        revoked: false,
        revoked_at: None,
        revoked_reason: None,
        replaced_by: None,
        ip_address: token.ip_address,
        user_agent: token.user_agent,
        created_at: Utc::now(),
    }
}

fn mark_revoked(row: &mut RefreshTokenRow, reason: RevocationReason, now: DateTime<Utc>) -> bool {
    if row.revoked {
        return false;
    }
    row.revoked = true;
    row.revoked_at = Some(now);
    row.revoked_reason = Some(reason.as_str().to_string());
    true
}

fn insert_unique(
    tokens: &mut HashMap<Uuid, RefreshTokenRow>,
    token: CreateRefreshToken,
) -> DbResult<RefreshTokenRow> {
    if tokens.contains_key(&token.id) || tokens.values().any(|t| t.token_hash == token.token_hash) {
        return Err(DbError::Conflict("refresh token already exists".to_string()));
    }
    let row = new_row(token);
    tokens.insert(row.id, row.clone());
    Ok(row)
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<RefreshTokenRow>> {
        Ok(self.tokens.lock().await.get(&id).cloned())
    }

    async fn find_by_hash(&self, token_hash: &str) -> DbResult<Option<RefreshTokenRow>> {
        let tokens = self.tokens.lock().await;
        Ok(tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn create(&self, token: CreateRefreshToken) -> DbResult<RefreshTokenRow> {
        let mut tokens = self.tokens.lock().await;
        insert_unique(&mut tokens, token)
    }

    async fn rotate(
        &self,
        old_id: Uuid,
        successor: CreateRefreshToken,
        now: DateTime<Utc>,
    ) -> DbResult<RotateOutcome> {
        let mut tokens = self.tokens.lock().await;

        let Some(old) = tokens.get_mut(&old_id) else {
            return Ok(RotateOutcome::AlreadyConsumed);
        };
        if !mark_revoked(old, RevocationReason::Rotated, now) {
            return Ok(RotateOutcome::AlreadyConsumed);
        }
        old.replaced_by = Some(successor.id);

        match insert_unique(&mut tokens, successor) {
            Ok(row) => Ok(RotateOutcome::Rotated(row)),
            Err(e) => {
                // Undo the revoke, mirroring a rolled back transaction.
                if let Some(old) = tokens.get_mut(&old_id) {
                    old.revoked = false;
                    old.revoked_at = None;
                    old.revoked_reason = None;
                    old.replaced_by = None;
                }
                Err(e)
            }
        }
    }

    async fn revoke(
        &self,
        id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens
            .get_mut(&id)
            .map(|row| mark_revoked(row, reason, now))
            .unwrap_or(false))
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut revoked = 0;
        for row in tokens.values_mut().filter(|t| t.family_id == family_id) {
            if mark_revoked(row, reason, now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut revoked = 0;
        for row in tokens.values_mut().filter(|t| t.user_id == user_id) {
            if mark_revoked(row, reason, now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}
