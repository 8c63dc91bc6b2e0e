//! In-memory login attempt repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{AttemptSummary, LoginAttemptRow};
use crate::repo::{LoginAttemptRepository, NewLoginAttempt, LOCKED_REASON};

/// In-memory login attempt log (append order is attempt order)
#[derive(Default, Clone)]
pub struct MemoryLoginAttemptRepository {
    attempts: Arc<Mutex<Vec<LoginAttemptRow>>>,
}

impl MemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt recorded for a pair, oldest first
    pub async fn attempts_for(&self, email: &str, ip_address: &str) -> Vec<LoginAttemptRow> {
        self.attempts
            .lock()
            .await
            .iter()
            .filter(|a| a.email == email && a.ip_address == ip_address)
            .cloned()
            .collect()
    }
}

fn summarize(
    attempts: &[LoginAttemptRow],
    email: &str,
    ip_address: &str,
    window_start: Option<DateTime<Utc>>,
) -> AttemptSummary {
    let pair: Vec<&LoginAttemptRow> = attempts
        .iter()
        .filter(|a| a.email == email && a.ip_address == ip_address)
        .collect();

    let since_success = pair
        .iter()
        .rposition(|a| a.success)
        .map_or(0, |idx| idx + 1);

    let counted = pair[since_success..]
        .iter()
        .filter(|a| !a.success && a.failure_reason.as_deref() != Some(LOCKED_REASON))
        .filter(|a| window_start.map_or(true, |start| a.attempted_at >= start));

    let mut summary = AttemptSummary::default();
    for attempt in counted {
        summary.failures += 1;
        summary.last_failure_at = summary.last_failure_at.max(Some(attempt.attempted_at));
    }
    summary
}

fn into_row(attempt: NewLoginAttempt) -> LoginAttemptRow {
    LoginAttemptRow {
        id: attempt.id,
        email: attempt.email,
        ip_address: attempt.ip_address,
        success: attempt.success,
        failure_reason: attempt.failure_reason,
        attempted_at: attempt.attempted_at,
    }
}

#[async_trait]
impl LoginAttemptRepository for MemoryLoginAttemptRepository {
    async fn record(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        let mut attempts = self.attempts.lock().await;
        let (email, ip_address) = (attempt.email.clone(), attempt.ip_address.clone());
        attempts.push(into_row(attempt));
        Ok(summarize(&attempts, &email, &ip_address, window_start))
    }

    async fn reserve(
        &self,
        attempt: NewLoginAttempt,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        let mut attempts = self.attempts.lock().await;
        let prior = summarize(&attempts, &attempt.email, &attempt.ip_address, window_start);
        attempts.push(into_row(attempt));
        Ok(prior)
    }

    async fn settle(&self, id: Uuid, success: bool, failure_reason: Option<&str>) -> DbResult<()> {
        let mut attempts = self.attempts.lock().await;
        let row = attempts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DbError::NotFound)?;
        row.success = success;
        row.failure_reason = failure_reason.map(str::to_string);
        Ok(())
    }

    async fn summary(
        &self,
        email: &str,
        ip_address: &str,
        window_start: Option<DateTime<Utc>>,
    ) -> DbResult<AttemptSummary> {
        let attempts = self.attempts.lock().await;
        Ok(summarize(&attempts, email, ip_address, window_start))
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let mut attempts = self.attempts.lock().await;
        let before = attempts.len();
        attempts.retain(|a| a.attempted_at >= cutoff);
        Ok((before - attempts.len()) as u64)
    }
}
