//! Tenant subscription status and eligibility

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Billing status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// In trial period
    Trial,
    /// Paid and current
    Active,
    /// Payment is late; allowed while inside the grace period
    PastDue,
    /// Blocked by an operator
    Suspended,
    /// Trial or paid period ran out
    Expired,
    /// Subscription was cancelled
    Cancelled,
}

impl SubscriptionStatus {
    /// Database / wire representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::PastDue => "PAST_DUE",
            Self::Suspended => "SUSPENDED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRIAL" => Ok(Self::Trial),
            "ACTIVE" => Ok(Self::Active),
            "PAST_DUE" => Ok(Self::PastDue),
            "SUSPENDED" => Ok(Self::Suspended),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(crate::ParseEnumError::new("subscription status", s)),
        }
    }
}

/// Why a user may not act inside a tenant.
///
/// These reasons are safe to show to an already authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// No active membership for (user, tenant)
    NoMembership,
    /// Tenant suspended by an operator
    TenantSuspended,
    /// Trial ended without conversion
    TrialExpired,
    /// Past-due grace period elapsed
    GracePeriodExpired,
    /// Subscription expired or was cancelled
    SubscriptionEnded,
}

impl IneligibleReason {
    /// Error code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoMembership => "MEMBERSHIP_NOT_FOUND",
            Self::TenantSuspended => "TENANT_SUSPENDED",
            Self::TrialExpired => "TRIAL_EXPIRED",
            Self::GracePeriodExpired => "GRACE_PERIOD_EXPIRED",
            Self::SubscriptionEnded => "SUBSCRIPTION_ENDED",
        }
    }
}

impl std::fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::NoMembership => "no active membership in this tenant",
            Self::TenantSuspended => "tenant is suspended",
            Self::TrialExpired => "trial period has ended",
            Self::GracePeriodExpired => "payment grace period has ended",
            Self::SubscriptionEnded => "subscription has ended",
        };
        f.write_str(msg)
    }
}

/// Tenant as seen by the security core (status checks only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Decide whether the tenant currently admits requests.
    ///
    /// A trial or past-due tenant without an end timestamp is treated as
    /// already ended.
    pub fn check_standing(&self, now: DateTime<Utc>) -> Result<(), IneligibleReason> {
        match self.status {
            SubscriptionStatus::Active => Ok(()),
            SubscriptionStatus::Trial => match self.trial_ends_at {
                Some(ends) if now < ends => Ok(()),
                _ => Err(IneligibleReason::TrialExpired),
            },
            SubscriptionStatus::PastDue => match self.grace_period_ends_at {
                Some(ends) if now < ends => Ok(()),
                _ => Err(IneligibleReason::GracePeriodExpired),
            },
            SubscriptionStatus::Suspended => Err(IneligibleReason::TenantSuspended),
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => {
                Err(IneligibleReason::SubscriptionEnded)
            }
        }
    }
}
