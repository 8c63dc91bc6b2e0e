//! Membership role hierarchy

use serde::{Deserialize, Serialize};

/// Role a user holds inside a tenant.
///
/// Roles form a hierarchy: `Owner > Admin > {Finance, Sales, Warehouse} > Staff`.
/// The three department roles share a rank; none of them satisfies a
/// requirement for another department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Tenant owner (exactly one per tenant)
    Owner,
    /// Tenant administrator
    Admin,
    /// Finance department
    Finance,
    /// Sales department
    Sales,
    /// Warehouse department
    Warehouse,
    /// Baseline member
    Staff,
}

impl Role {
    /// Every role, highest rank first.
    pub const ALL: [Role; 6] = [
        Role::Owner,
        Role::Admin,
        Role::Finance,
        Role::Sales,
        Role::Warehouse,
        Role::Staff,
    ];

    /// Position in the hierarchy (higher is more privileged).
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Admin => 3,
            Self::Finance | Self::Sales | Self::Warehouse => 2,
            Self::Staff => 1,
        }
    }

    /// Whether this role meets or exceeds `required`.
    ///
    /// Department roles only satisfy themselves at their own rank; a
    /// strictly higher rank satisfies everything below it.
    pub const fn satisfies(&self, required: Role) -> bool {
        let (have, need) = (self.rank(), required.rank());
        if have != need {
            return have > need;
        }
        // Same rank: only the department tier has more than one member.
        matches!(
            (self, required),
            (Self::Owner, Self::Owner)
                | (Self::Admin, Self::Admin)
                | (Self::Staff, Self::Staff)
                | (Self::Finance, Self::Finance)
                | (Self::Sales, Self::Sales)
                | (Self::Warehouse, Self::Warehouse)
        )
    }

    /// Admin or owner.
    pub const fn is_admin_or_above(&self) -> bool {
        self.rank() >= Role::Admin.rank()
    }

    /// Stable, upper-case wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
            Self::Finance => "FINANCE",
            Self::Sales => "SALES",
            Self::Warehouse => "WAREHOUSE",
            Self::Staff => "STAFF",
        }
    }

    const fn tiebreak(&self) -> u8 {
        match self {
            Self::Finance => 2,
            Self::Sales => 1,
            _ => 0,
        }
    }
}

impl Ord for Role {
    /// Total order: by rank, department roles ordered Finance > Sales > Warehouse.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.rank(), self.tiebreak()).cmp(&(other.rank(), other.tiebreak()))
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(Self::Owner),
            "ADMIN" => Ok(Self::Admin),
            "FINANCE" => Ok(Self::Finance),
            "SALES" => Ok(Self::Sales),
            "WAREHOUSE" => Ok(Self::Warehouse),
            "STAFF" => Ok(Self::Staff),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing a role string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hierarchy_order() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Finance);
        assert!(Role::Admin > Role::Warehouse);
        assert!(Role::Warehouse > Role::Staff);
    }

    #[test]
    fn test_department_roles_are_peers() {
        assert!(!Role::Finance.satisfies(Role::Sales));
        assert!(!Role::Sales.satisfies(Role::Warehouse));
        assert!(Role::Sales.satisfies(Role::Sales));
        assert!(Role::Sales.satisfies(Role::Staff));
        assert!(Role::Admin.satisfies(Role::Finance));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Warehouse".parse::<Role>().unwrap(), Role::Warehouse);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        let role: Role = serde_json::from_str("\"OWNER\"").unwrap();
        assert_eq!(role, Role::Owner);
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_satisfies_is_reflexive(role in arb_role()) {
            prop_assert!(role.satisfies(role));
        }

        #[test]
        fn prop_higher_rank_satisfies_lower(a in arb_role(), b in arb_role()) {
            if a.rank() > b.rank() {
                prop_assert!(a.satisfies(b));
                prop_assert!(!b.satisfies(a));
            }
        }

        #[test]
        fn prop_order_is_total_and_consistent(a in arb_role(), b in arb_role()) {
            let forward = a.cmp(&b);
            prop_assert_eq!(forward.reverse(), b.cmp(&a));
            if a != b {
                prop_assert_ne!(forward, std::cmp::Ordering::Equal);
            }
        }

        #[test]
        fn prop_display_parse_roundtrip(role in arb_role()) {
            prop_assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
