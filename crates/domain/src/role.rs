use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spenvia_core::{AppResult, CompanyId, FixedRole, NonEmptyString};
use uuid::Uuid;

use crate::Permission;

/// Unique identifier for a custom role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Statically defined grant attached to a built-in role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGrant {
    /// Every permission in every company. Held only by the super-admin role
    /// and kept as a sentinel rather than an enumerated list, so the grant
    /// cannot drift when the catalog grows.
    All,
    /// An enumerated subset of the catalog.
    Permissions(&'static [Permission]),
}

const USER_GRANT: &[Permission] = &[
    Permission::ExpensesView,
    Permission::ExpensesCreate,
    Permission::ReportsView,
];

const CONTROLLER_GRANT: &[Permission] = &[
    Permission::GlAccountsView,
    Permission::ExpensesView,
    Permission::ExpensesCreate,
    Permission::ExpensesApprove,
    Permission::UsersView,
    Permission::ReportsView,
    Permission::ReportsExport,
];

const ADMIN_GRANT: &[Permission] = &[
    Permission::GlAccountsView,
    Permission::GlAccountsManage,
    Permission::ExpensesView,
    Permission::ExpensesCreate,
    Permission::ExpensesApprove,
    Permission::ExpensesDelete,
    Permission::UsersView,
    Permission::UsersCreate,
    Permission::UsersManage,
    Permission::ReportsView,
    Permission::ReportsExport,
    Permission::CompaniesManage,
];

/// Returns the statically defined grant for a built-in role.
///
/// Pure lookup; cannot fail at call time.
#[must_use]
pub fn fixed_role_grant(role: FixedRole) -> RoleGrant {
    match role {
        FixedRole::User => RoleGrant::Permissions(USER_GRANT),
        FixedRole::Controller => RoleGrant::Permissions(CONTROLLER_GRANT),
        FixedRole::Admin => RoleGrant::Permissions(ADMIN_GRANT),
        FixedRole::SuperAdmin => RoleGrant::All,
    }
}

/// The union of all permissions a principal holds for one company at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissionSet {
    /// Cross-company super-admin override.
    All,
    /// Explicit permission set; empty means no access.
    Permissions(BTreeSet<Permission>),
}

impl EffectivePermissionSet {
    /// Returns the empty permission set.
    #[must_use]
    pub fn empty() -> Self {
        Self::Permissions(BTreeSet::new())
    }

    /// Creates an effective set seeded from a fixed-role grant.
    #[must_use]
    pub fn from_grant(grant: RoleGrant) -> Self {
        match grant {
            RoleGrant::All => Self::All,
            RoleGrant::Permissions(permissions) => {
                Self::Permissions(permissions.iter().copied().collect())
            }
        }
    }

    /// Unions additional permissions into the set. A no-op on the sentinel.
    pub fn extend(&mut self, permissions: impl IntoIterator<Item = Permission>) {
        if let Self::Permissions(set) = self {
            set.extend(permissions);
        }
    }

    /// Returns whether the set contains the permission.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        match self {
            Self::All => true,
            Self::Permissions(set) => set.contains(&permission),
        }
    }

    /// Returns whether this is the cross-company sentinel.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns whether the set grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Permissions(set) => set.is_empty(),
        }
    }
}

/// A company-defined, named permission subset assignable to principals
/// within that company.
///
/// Owned exclusively by its company; two custom roles in different companies
/// may share a name but are distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    /// Stable role identifier.
    pub id: RoleId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Role name, unique within the company.
    pub name: NonEmptyString,
    /// Catalog permissions granted by the role.
    pub permissions: BTreeSet<Permission>,
    /// Optional operator-facing description.
    pub description: Option<String>,
    /// Soft-disable flag; disabled roles grant nothing.
    pub is_disabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CustomRole {
    /// Creates an enabled custom role after validating the name.
    pub fn new(
        company_id: CompanyId,
        name: impl Into<String>,
        permissions: BTreeSet<Permission>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: RoleId::new(),
            company_id,
            name: NonEmptyString::new(name)?,
            permissions,
            description,
            is_disabled: false,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use spenvia_core::{CompanyId, FixedRole};

    use super::{CustomRole, EffectivePermissionSet, RoleGrant, fixed_role_grant};
    use crate::Permission;

    #[test]
    fn super_admin_grant_is_the_sentinel() {
        assert_eq!(fixed_role_grant(FixedRole::SuperAdmin), RoleGrant::All);
    }

    #[test]
    fn user_grant_is_a_subset_of_controller_grant() {
        let user = match fixed_role_grant(FixedRole::User) {
            RoleGrant::Permissions(permissions) => permissions,
            RoleGrant::All => panic!("user grant must be enumerated"),
        };
        let controller = match fixed_role_grant(FixedRole::Controller) {
            RoleGrant::Permissions(permissions) => permissions,
            RoleGrant::All => panic!("controller grant must be enumerated"),
        };

        for permission in user {
            assert!(controller.contains(permission));
        }
    }

    #[test]
    fn admin_grant_covers_the_catalog() {
        let admin = match fixed_role_grant(FixedRole::Admin) {
            RoleGrant::Permissions(permissions) => permissions,
            RoleGrant::All => panic!("admin grant must be enumerated, not the sentinel"),
        };

        for permission in Permission::all() {
            assert!(admin.contains(permission));
        }
    }

    #[test]
    fn sentinel_contains_everything_and_ignores_extend() {
        let mut set = EffectivePermissionSet::All;
        set.extend([Permission::ExpensesView]);
        assert!(set.is_all());
        for permission in Permission::all() {
            assert!(set.contains(*permission));
        }
    }

    #[test]
    fn empty_set_grants_nothing() {
        let set = EffectivePermissionSet::empty();
        assert!(set.is_empty());
        assert!(!set.contains(Permission::ExpensesView));
    }

    #[test]
    fn extend_unions_into_an_enumerated_set() {
        let mut set = EffectivePermissionSet::from_grant(fixed_role_grant(FixedRole::User));
        assert!(!set.contains(Permission::ExpensesApprove));
        set.extend([Permission::ExpensesApprove]);
        assert!(set.contains(Permission::ExpensesApprove));
        assert!(set.contains(Permission::ExpensesView));
    }

    #[test]
    fn custom_role_rejects_blank_name() {
        let result = CustomRole::new(
            CompanyId::new(),
            "  ",
            BTreeSet::new(),
            None,
            chrono::Utc::now(),
        );
        assert!(result.is_err());
    }
}
