use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spenvia_core::AppError;

/// Permissions enforced by application policy checks.
///
/// The catalog is static: every key is a namespaced `resource.action` string
/// that is never reused for different semantics once published. Unknown keys
/// fail at parse time, so a custom role can only ever reference catalog keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows viewing the general-ledger account list.
    GlAccountsView,
    /// Allows creating and editing general-ledger accounts.
    GlAccountsManage,
    /// Allows viewing expenses in the company.
    ExpensesView,
    /// Allows submitting new expenses.
    ExpensesCreate,
    /// Allows approving or rejecting submitted expenses.
    ExpensesApprove,
    /// Allows deleting expenses.
    ExpensesDelete,
    /// Allows viewing company member profiles.
    UsersView,
    /// Allows inviting and creating company members.
    UsersCreate,
    /// Allows editing and deactivating company members.
    UsersManage,
    /// Allows viewing dashboards and reports.
    ReportsView,
    /// Allows exporting report data.
    ReportsExport,
    /// Allows editing company settings.
    CompaniesManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlAccountsView => "gl_accounts.view",
            Self::GlAccountsManage => "gl_accounts.manage",
            Self::ExpensesView => "expenses.view",
            Self::ExpensesCreate => "expenses.create",
            Self::ExpensesApprove => "expenses.approve",
            Self::ExpensesDelete => "expenses.delete",
            Self::UsersView => "users.view",
            Self::UsersCreate => "users.create",
            Self::UsersManage => "users.manage",
            Self::ReportsView => "reports.view",
            Self::ReportsExport => "reports.export",
            Self::CompaniesManage => "companies.manage",
        }
    }

    /// Returns the resource namespace the permission belongs to.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        match self {
            Self::GlAccountsView | Self::GlAccountsManage => "gl_accounts",
            Self::ExpensesView
            | Self::ExpensesCreate
            | Self::ExpensesApprove
            | Self::ExpensesDelete => "expenses",
            Self::UsersView | Self::UsersCreate | Self::UsersManage => "users",
            Self::ReportsView | Self::ReportsExport => "reports",
            Self::CompaniesManage => "companies",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
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

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "gl_accounts.view" => Ok(Self::GlAccountsView),
            "gl_accounts.manage" => Ok(Self::GlAccountsManage),
            "expenses.view" => Ok(Self::ExpensesView),
            "expenses.create" => Ok(Self::ExpensesCreate),
            "expenses.approve" => Ok(Self::ExpensesApprove),
            "expenses.delete" => Ok(Self::ExpensesDelete),
            "users.view" => Ok(Self::UsersView),
            "users.create" => Ok(Self::UsersCreate),
            "users.manage" => Ok(Self::UsersManage),
            "reports.view" => Ok(Self::ReportsView),
            "reports.export" => Ok(Self::ReportsExport),
            "companies.manage" => Ok(Self::CompaniesManage),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::str::FromStr;

    use super::Permission;

    #[test]
    fn permission_roundtrip_storage_value() {
        for permission in Permission::all() {
            let restored = Permission::from_str(permission.as_str());
            assert_eq!(restored.ok(), Some(*permission));
        }
    }

    #[test]
    fn unknown_permission_is_rejected() {
        assert!(Permission::from_str("expenses.unknown").is_err());
    }

    #[test]
    fn catalog_keys_are_unique() {
        let keys: BTreeSet<&str> = Permission::all().iter().map(Permission::as_str).collect();
        assert_eq!(keys.len(), Permission::all().len());
    }

    #[test]
    fn storage_keys_are_namespaced_by_resource() {
        for permission in Permission::all() {
            let key = permission.as_str();
            assert!(
                key.starts_with(permission.resource()),
                "key '{key}' does not start with its resource namespace"
            );
            assert_eq!(key.matches('.').count(), 1, "key '{key}' is not resource.action");
        }
    }
}
