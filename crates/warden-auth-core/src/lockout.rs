//! Brute-force guard
//!
//! Lockout state is derived from the login-attempt log, never stored. Each
//! (email, ip) pair is tallied independently; a success bounds the tally.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use warden_db::{
    AttemptSummary, LoginAttemptRepository, NewLoginAttempt, LOCKED_REASON, PENDING_REASON,
};
use warden_types::{AuditEvent, SharedAuditSink};

use crate::AuthError;

// =============================================================================
// Policy
// =============================================================================

/// One lockout step: from `threshold` failures on, lock for `duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutTier {
    pub threshold: u32,
    pub duration: Duration,
}

/// How counted failures are bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingMode {
    /// Every failure since the last success counts
    CumulativeUntilSuccess,
    /// Only failures since the last success and within the trailing window
    SlidingWindow(Duration),
}

/// Lockout tiers plus counting mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    tiers: Vec<LockoutTier>,
    pub counting: CountingMode,
}

/// Invalid lockout policy
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("lockout tiers must not be empty")]
    Empty,
    #[error("invalid lockout tier '{0}', expected <failures>:<seconds>")]
    Malformed(String),
    #[error("lockout tiers must have increasing thresholds and durations")]
    NotIncreasing,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        let tier = |threshold, secs| LockoutTier {
            threshold,
            duration: Duration::from_secs(secs),
        };
        Self {
            tiers: vec![tier(5, 300), tier(10, 900), tier(15, 3600), tier(20, 86_400)],
            counting: CountingMode::CumulativeUntilSuccess,
        }
    }
}

impl LockoutPolicy {
    /// Build from explicit tiers (sorted by threshold)
    pub fn new(mut tiers: Vec<LockoutTier>, counting: CountingMode) -> Result<Self, PolicyError> {
        tiers.sort_by_key(|t| t.threshold);
        let policy = Self { tiers, counting };
        policy.validate()?;
        Ok(policy)
    }

    /// Parse tiers from `"5:300,10:900,15:3600,20:86400"`
    pub fn parse_tiers(raw: &str) -> Result<Vec<LockoutTier>, PolicyError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|part| {
                let (count, secs) = part
                    .split_once(':')
                    .ok_or_else(|| PolicyError::Malformed(part.to_string()))?;
                let threshold = count
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| PolicyError::Malformed(part.to_string()))?;
                let secs = secs
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| PolicyError::Malformed(part.to_string()))?;
                Ok(LockoutTier {
                    threshold,
                    duration: Duration::from_secs(secs),
                })
            })
            .collect()
    }

    /// Check tiers are non-empty and strictly increasing
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.tiers.is_empty() {
            return Err(PolicyError::Empty);
        }
        if self.tiers[0].threshold == 0 {
            return Err(PolicyError::Malformed("0".to_string()));
        }
        let increasing = self.tiers.windows(2).all(|w| {
            w[0].threshold < w[1].threshold && w[0].duration < w[1].duration
        });
        if !increasing {
            return Err(PolicyError::NotIncreasing);
        }
        Ok(())
    }

    /// Set counting mode
    #[must_use]
    pub fn with_counting(mut self, counting: CountingMode) -> Self {
        self.counting = counting;
        self
    }

    pub fn tiers(&self) -> &[LockoutTier] {
        &self.tiers
    }

    /// Highest tier reached by `failures`, if any
    pub fn tier_for(&self, failures: u32) -> Option<&LockoutTier> {
        self.tiers.iter().rev().find(|t| failures >= t.threshold)
    }

    /// Whether `failures` lands exactly on a tier threshold
    pub fn crosses_tier(&self, failures: u32) -> bool {
        self.tiers.iter().any(|t| t.threshold == failures)
    }

    /// Lower bound on counted attempts for the current mode
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.counting {
            CountingMode::CumulativeUntilSuccess => None,
            CountingMode::SlidingWindow(window) => {
                chrono::Duration::from_std(window).ok().map(|w| now - w)
            }
        }
    }

    /// Derive the lockout state from a failure tally
    pub fn evaluate(&self, summary: &AttemptSummary, now: DateTime<Utc>) -> LockoutStatus {
        let failures = u32::try_from(summary.failures.max(0)).unwrap_or(u32::MAX);
        let (Some(tier), Some(last)) = (self.tier_for(failures), summary.last_failure_at) else {
            return LockoutStatus::open(failures);
        };

        let until = chrono::Duration::from_std(tier.duration)
            .map(|d| last + d)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match (until - now).to_std() {
            Ok(remaining) if !remaining.is_zero() => LockoutStatus {
                locked: true,
                retry_after: remaining,
                failures,
            },
            _ => LockoutStatus::open(failures),
        }
    }
}

/// Current lockout state of an (email, ip) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    /// Zero when not locked
    pub retry_after: Duration,
    /// Counted failures
    pub failures: u32,
}

impl LockoutStatus {
    fn open(failures: u32) -> Self {
        Self {
            locked: false,
            retry_after: Duration::ZERO,
            failures,
        }
    }

    /// `Err(AccountLocked)` if locked
    pub fn ensure_open(&self) -> Result<(), AuthError> {
        if self.locked {
            Err(AuthError::AccountLocked {
                retry_after: self.retry_after,
            })
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Records login attempts and answers lockout queries
#[derive(Clone)]
pub struct BruteForceGuard {
    repo: Arc<dyn LoginAttemptRepository>,
    policy: LockoutPolicy,
    audit: SharedAuditSink,
}

impl BruteForceGuard {
    /// Create a new guard
    pub fn new(
        repo: Arc<dyn LoginAttemptRepository>,
        policy: LockoutPolicy,
        audit: SharedAuditSink,
    ) -> Self {
        Self { repo, policy, audit }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Lockout state for the pair right now
    pub async fn check(&self, email: &str, ip: &str) -> Result<LockoutStatus, AuthError> {
        self.check_at(email, ip, Utc::now()).await
    }

    /// Lockout state for the pair as of `now`
    pub async fn check_at(
        &self,
        email: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<LockoutStatus, AuthError> {
        let summary = self
            .repo
            .summary(email, ip, self.policy.window_start(now))
            .await?;
        Ok(self.policy.evaluate(&summary, now))
    }

    /// Append an attempt and return the pair's state including it
    pub async fn record_attempt(
        &self,
        email: &str,
        ip: &str,
        success: bool,
        reason: Option<&str>,
    ) -> Result<LockoutStatus, AuthError> {
        self.record_at(email, ip, success, reason, Utc::now()).await
    }

    /// Append an attempt that happened at `at`
    pub async fn record_at(
        &self,
        email: &str,
        ip: &str,
        success: bool,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<LockoutStatus, AuthError> {
        let attempt = NewLoginAttempt {
            id: Uuid::new_v4(),
            email: email.to_string(),
            ip_address: ip.to_string(),
            success,
            failure_reason: reason.map(str::to_string),
            attempted_at: at,
        };
        let summary = self.repo.record(attempt, self.policy.window_start(at)).await?;
        let status = self.policy.evaluate(&summary, at);

        if !success && reason != Some(LOCKED_REASON) {
            self.note_failure(email, ip, status);
        }
        Ok(status)
    }

    /// Admit a login attempt for the pair or reject it with `AccountLocked`
    ///
    /// Deciding and reserving happen in one serialized store call, and the
    /// reservation counts as a failure until settled. N concurrent attempts
    /// therefore see 0..N prior failures, and only those below the first
    /// tier reach password verification.
    pub async fn admit(&self, email: &str, ip: &str) -> Result<AttemptTicket, AuthError> {
        self.admit_at(email, ip, Utc::now()).await
    }

    /// Admit an attempt made at `now`
    pub async fn admit_at(
        &self,
        email: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<AttemptTicket, AuthError> {
        let id = Uuid::new_v4();
        let attempt = NewLoginAttempt {
            id,
            email: email.to_string(),
            ip_address: ip.to_string(),
            success: false,
            failure_reason: Some(PENDING_REASON.to_string()),
            attempted_at: now,
        };
        let prior = self.repo.reserve(attempt, self.policy.window_start(now)).await?;

        let status = self.policy.evaluate(&prior, now);
        if status.locked {
            self.repo.settle(id, false, Some(LOCKED_REASON)).await?;
            return Err(AuthError::AccountLocked {
                retry_after: status.retry_after,
            });
        }

        Ok(AttemptTicket {
            id,
            email: email.to_string(),
            ip: ip.to_string(),
            prior,
            at: now,
        })
    }

    /// Settle an admitted attempt as a success
    pub async fn succeed(&self, ticket: AttemptTicket) -> Result<(), AuthError> {
        self.repo.settle(ticket.id, true, None).await?;
        Ok(())
    }

    /// Settle an admitted attempt as a counted failure
    ///
    /// Returns the pair's state including this failure.
    pub async fn fail(&self, ticket: AttemptTicket, reason: &str) -> Result<LockoutStatus, AuthError> {
        self.repo.settle(ticket.id, false, Some(reason)).await?;

        let summary = AttemptSummary {
            failures: ticket.prior.failures + 1,
            last_failure_at: ticket.prior.last_failure_at.max(Some(ticket.at)),
        };
        let status = self.policy.evaluate(&summary, ticket.at);
        self.note_failure(&ticket.email, &ticket.ip, status);
        Ok(status)
    }

    fn note_failure(&self, email: &str, ip: &str, status: LockoutStatus) {
        if !(status.locked && self.policy.crosses_tier(status.failures)) {
            return;
        }
        tracing::warn!(
            email,
            ip,
            failures = status.failures,
            retry_after_secs = status.retry_after.as_secs(),
            "lockout engaged"
        );
        metrics::counter!("warden_lockouts_total").increment(1);
        self.audit.record(AuditEvent::LockoutEngaged {
            email: email.to_string(),
            ip: ip.to_string(),
            failures: status.failures,
            retry_after_secs: status.retry_after.as_secs(),
        });
    }
}

/// Login attempt admitted by [`BruteForceGuard::admit`]
///
/// Counts as a failure for the pair until passed to
/// [`BruteForceGuard::succeed`] or [`BruteForceGuard::fail`]; a ticket that
/// is dropped stays counted.
#[derive(Debug)]
#[must_use = "an unsettled attempt stays counted as a failure"]
pub struct AttemptTicket {
    id: Uuid,
    email: String,
    ip: String,
    prior: AttemptSummary,
    at: DateTime<Utc>,
}

impl AttemptTicket {
    /// Counted failures ahead of this attempt
    pub fn prior_failures(&self) -> i64 {
        self.prior.failures
    }
}

impl std::fmt::Debug for BruteForceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BruteForceGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
