use std::collections::BTreeSet;

use async_trait::async_trait;
use spenvia_core::{AppResult, CompanyId};
use spenvia_domain::{CustomRole, Permission, RoleId};

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name in company scope.
    pub name: String,
    /// Catalog grants to attach to the role.
    pub permissions: BTreeSet<Permission>,
    /// Optional operator-facing description.
    pub description: Option<String>,
}

/// Input payload for editing custom roles. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// Replacement role name.
    pub name: Option<String>,
    /// Replacement permission set.
    pub permissions: Option<BTreeSet<Permission>>,
    /// Replacement description.
    pub description: Option<String>,
}

/// Repository port for custom-role records.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Persists a new role. Fails with a conflict when the name is already
    /// taken within the role's company.
    async fn create_role(&self, role: CustomRole) -> AppResult<CustomRole>;

    /// Finds a role by identifier, regardless of company.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<CustomRole>>;

    /// Persists changes to an existing role.
    async fn update_role(&self, role: CustomRole) -> AppResult<CustomRole>;

    /// Lists all roles owned by a company.
    async fn list_roles(&self, company_id: CompanyId) -> AppResult<Vec<CustomRole>>;
}
