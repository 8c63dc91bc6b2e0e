//! Membership invariants
//!
//! Checked against the tenant's current membership rows before any change is
//! written. Both store implementations call [`check_membership_change`] while
//! holding the tenant's rows exclusively.

use thiserror::Error;
use warden_types::{Role, UserId};

use crate::models::MembershipRow;

/// Change requested against a tenant's memberships
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Add (or reactivate) a member with a role
    Add { user_id: UserId, role: Role },
    /// Change an active member's role
    ChangeRole { user_id: UserId, role: Role },
    /// Deactivate a member
    Remove { user_id: UserId },
}

impl MembershipChange {
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Add { user_id, .. }
            | Self::ChangeRole { user_id, .. }
            | Self::Remove { user_id } => *user_id,
        }
    }

    /// Short label for logs and audit events
    pub fn label(&self) -> String {
        match self {
            Self::Add { role, .. } => format!("added as {role}"),
            Self::ChangeRole { role, .. } => format!("role changed to {role}"),
            Self::Remove { .. } => "removed".to_string(),
        }
    }
}

/// Invariant a membership change would break
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipRule {
    /// The owner cannot be demoted or removed
    #[error("the tenant owner cannot be changed or removed")]
    OwnerImmutable,

    /// OWNER cannot be granted through membership administration
    #[error("the owner role cannot be granted")]
    OwnerNotGrantable,

    /// The change would leave no active admin-or-above
    #[error("at least one active admin must remain")]
    LastAdmin,

    /// The user already has an active membership
    #[error("user is already a member of this tenant")]
    AlreadyMember,

    /// No active membership for the target user
    #[error("user is not a member of this tenant")]
    NotMember,
}

/// Validate `change` against every membership row of one tenant
pub fn check_membership_change(
    members: &[MembershipRow],
    change: &MembershipChange,
) -> Result<(), MembershipRule> {
    let target = change.user_id();
    let current = members.iter().find(|m| m.user_id == target.0);
    let current_role = current
        .filter(|m| m.active)
        .and_then(|m| m.role.parse::<Role>().ok());

    match *change {
        MembershipChange::Add { role, .. } => {
            if role == Role::Owner {
                return Err(MembershipRule::OwnerNotGrantable);
            }
            if current_role.is_some() {
                return Err(MembershipRule::AlreadyMember);
            }
            Ok(())
        }
        MembershipChange::ChangeRole { role, .. } => {
            let existing = current_role.ok_or(MembershipRule::NotMember)?;
            if existing == Role::Owner {
                return Err(MembershipRule::OwnerImmutable);
            }
            if role == Role::Owner {
                return Err(MembershipRule::OwnerNotGrantable);
            }
            if existing.is_admin_or_above() && !role.is_admin_or_above() {
                ensure_other_admin(members, target)?;
            }
            Ok(())
        }
        MembershipChange::Remove { .. } => {
            let existing = current_role.ok_or(MembershipRule::NotMember)?;
            if existing == Role::Owner {
                return Err(MembershipRule::OwnerImmutable);
            }
            if existing.is_admin_or_above() {
                ensure_other_admin(members, target)?;
            }
            Ok(())
        }
    }
}

fn ensure_other_admin(members: &[MembershipRow], leaving: UserId) -> Result<(), MembershipRule> {
    let remaining = members
        .iter()
        .filter(|m| m.active && m.user_id != leaving.0)
        .filter_map(|m| m.role.parse::<Role>().ok())
        .filter(Role::is_admin_or_above)
        .count();

    if remaining == 0 {
        Err(MembershipRule::LastAdmin)
    } else {
        Ok(())
    }
}
