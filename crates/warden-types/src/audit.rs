//! Security audit trail

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{IneligibleReason, Role, TenantId, TokenFamilyId, UserId};

/// Security-relevant event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Login succeeded
    LoginSucceeded {
        user_id: UserId,
        tenant_id: TenantId,
        ip: String,
    },
    /// Login rejected (unknown email, bad password, ineligible tenant, locked)
    LoginFailed { email: String, ip: String, reason: String },
    /// A failure crossed a lockout tier
    LockoutEngaged {
        email: String,
        ip: String,
        failures: u32,
        retry_after_secs: u64,
    },
    /// A consumed refresh token was presented again
    TokenReplayDetected {
        user_id: UserId,
        family_id: TokenFamilyId,
        revoked: u64,
    },
    /// Refresh token lineage revoked for a reason other than replay
    SessionsRevoked {
        user_id: UserId,
        reason: String,
        revoked: u64,
    },
    /// User moved their session into another tenant
    TenantSwitched {
        user_id: UserId,
        from: TenantId,
        to: TenantId,
        role: Role,
    },
    /// Tenant switch or request rejected by membership resolution
    TenantAccessDenied {
        user_id: UserId,
        tenant_id: TenantId,
        reason: IneligibleReason,
    },
    /// Role gate rejected an operation
    InsufficientRole {
        user_id: UserId,
        tenant_id: TenantId,
        required: Role,
        actual: Role,
    },
    /// A bearer token failed validation
    TokenRejected { reason: String },
    /// Isolation bypass granted
    IsolationBypass {
        user_id: UserId,
        tenant_id: TenantId,
        reason: String,
    },
    /// Isolation bypass refused
    IsolationBypassDenied { user_id: UserId, reason: String },
    /// Data operation attempted without tenant context
    TenantContextMissing { operation: String, enforced: bool },
    /// Membership added, changed or removed
    MembershipChanged {
        actor: UserId,
        tenant_id: TenantId,
        member: UserId,
        change: String,
    },
}

impl AuditEvent {
    /// Short event name used as a log field
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginSucceeded { .. } => "login_succeeded",
            Self::LoginFailed { .. } => "login_failed",
            Self::LockoutEngaged { .. } => "lockout_engaged",
            Self::TokenReplayDetected { .. } => "token_replay_detected",
            Self::SessionsRevoked { .. } => "sessions_revoked",
            Self::TenantSwitched { .. } => "tenant_switched",
            Self::TenantAccessDenied { .. } => "tenant_access_denied",
            Self::InsufficientRole { .. } => "insufficient_role",
            Self::TokenRejected { .. } => "token_rejected",
            Self::IsolationBypass { .. } => "isolation_bypass",
            Self::IsolationBypassDenied { .. } => "isolation_bypass_denied",
            Self::TenantContextMissing { .. } => "tenant_context_missing",
            Self::MembershipChanged { .. } => "membership_changed",
        }
    }

    /// Whether operators should be alerted
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::LockoutEngaged { .. }
                | Self::TokenReplayDetected { .. }
                | Self::IsolationBypassDenied { .. }
        )
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    /// Record one event. Must not fail the calling operation.
    fn record(&self, event: AuditEvent);
}

/// Shared audit sink handle
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Writes audit events as structured `tracing` records under target `audit`
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let name = event.name();
        let payload = serde_json::to_string(&event).unwrap_or_default();
        if event.is_alert() {
            tracing::warn!(target: "audit", event = name, payload = %payload, "security event");
        } else {
            tracing::info!(target: "audit", event = name, payload = %payload, "security event");
        }
    }
}

/// Keeps events in memory (tests, local debugging)
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<(DateTime<Utc>, AuditEvent)>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Count events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((Utc::now(), event));
    }
}
