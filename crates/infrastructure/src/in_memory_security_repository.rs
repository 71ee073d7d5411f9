use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use spenvia_application::{AssignmentRepository, AuthorizationRepository, RoleRepository};
use spenvia_core::{AppError, AppResult, CompanyId, UserId};
use spenvia_domain::{AssignmentId, CustomRole, Permission, RoleAssignment, RoleId};

/// In-memory store for custom roles and role assignments.
///
/// Implements the resolver read, the role port, and the assignment port over
/// the same state, honoring the same invariants as the PostgreSQL adapters.
/// Used by tests and local development.
#[derive(Debug, Default)]
pub struct InMemorySecurityRepository {
    roles: RwLock<HashMap<RoleId, CustomRole>>,
    assignments: RwLock<Vec<RoleAssignment>>,
}

impl InMemorySecurityRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
            assignments: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AuthorizationRepository for InMemorySecurityRepository {
    async fn list_assignment_permissions(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Permission>> {
        let roles = self.roles.read().await;
        let assignments = self.assignments.read().await;

        let mut permissions: Vec<Permission> = assignments
            .iter()
            .filter(|assignment| {
                assignment.user_id == user_id
                    && assignment.company_id == company_id
                    && assignment.grants_at(now)
            })
            .filter_map(|assignment| roles.get(&assignment.custom_role_id))
            .filter(|role| !role.is_disabled)
            .flat_map(|role| role.permissions.iter().copied())
            .collect();
        permissions.sort_unstable();
        permissions.dedup();

        Ok(permissions)
    }
}

#[async_trait]
impl RoleRepository for InMemorySecurityRepository {
    async fn create_role(&self, role: CustomRole) -> AppResult<CustomRole> {
        let mut roles = self.roles.write().await;

        let name_taken = roles
            .values()
            .any(|stored| stored.company_id == role.company_id && stored.name == role.name);
        if name_taken {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists in company '{}'",
                role.name.as_str(),
                role.company_id
            )));
        }

        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<CustomRole>> {
        Ok(self.roles.read().await.get(&role_id).cloned())
    }

    async fn update_role(&self, role: CustomRole) -> AppResult<CustomRole> {
        let mut roles = self.roles.write().await;
        if !roles.contains_key(&role.id) {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id
            )));
        }

        let name_taken = roles.values().any(|stored| {
            stored.id != role.id
                && stored.company_id == role.company_id
                && stored.name == role.name
        });
        if name_taken {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists in company '{}'",
                role.name.as_str(),
                role.company_id
            )));
        }

        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn list_roles(&self, company_id: CompanyId) -> AppResult<Vec<CustomRole>> {
        let roles = self.roles.read().await;
        let mut listed: Vec<CustomRole> = roles
            .values()
            .filter(|role| role.company_id == company_id)
            .cloned()
            .collect();
        listed.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        Ok(listed)
    }
}

#[async_trait]
impl AssignmentRepository for InMemorySecurityRepository {
    async fn insert_assignment(
        &self,
        assignment: RoleAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<RoleAssignment> {
        // Uniqueness check and insert happen under one write lock, matching
        // the partial unique index the PostgreSQL adapter relies on.
        let mut assignments = self.assignments.write().await;

        let duplicate = assignments.iter().any(|stored| {
            stored.user_id == assignment.user_id
                && stored.custom_role_id == assignment.custom_role_id
                && stored.company_id == assignment.company_id
                && stored.grants_at(now)
        });
        if duplicate {
            return Err(AppError::Conflict(
                "an active assignment already exists for this user and role".to_owned(),
            ));
        }

        assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn find_assignment(&self, id: AssignmentId) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .find(|stored| stored.id == id)
            .cloned())
    }

    async fn update_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let mut assignments = self.assignments.write().await;
        match assignments
            .iter_mut()
            .find(|stored| stored.id == assignment.id)
        {
            Some(stored) => {
                *stored = assignment.clone();
                Ok(assignment)
            }
            None => Err(AppError::NotFound(format!(
                "assignment '{}' was not found",
                assignment.id
            ))),
        }
    }

    async fn list_assignments(
        &self,
        company_id: CompanyId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter(|stored| {
                stored.company_id == company_id
                    && user_id.is_none_or(|user_id| stored.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn deactivate_assignments_for_role(
        &self,
        company_id: CompanyId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let mut assignments = self.assignments.write().await;
        let mut changed = 0;
        for stored in assignments.iter_mut() {
            if stored.company_id == company_id
                && stored.custom_role_id == role_id
                && stored.is_active
            {
                stored.is_active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use spenvia_application::{
        AssignmentService, AuthorizationService, GrantInput, RoleAdminService, RoleRepository,
    };
    use spenvia_core::{AppError, CompanyId, FixedRole, Principal, UserId};
    use spenvia_domain::{CustomRole, Permission};

    use crate::InMemoryAuditRepository;

    use super::InMemorySecurityRepository;

    fn seeded_role(company_id: CompanyId, permissions: &[Permission]) -> CustomRole {
        match CustomRole::new(
            company_id,
            "expense-approver",
            permissions.iter().copied().collect::<BTreeSet<_>>(),
            Some("approves submitted expenses".to_owned()),
            Utc::now(),
        ) {
            Ok(role) => role,
            Err(error) => panic!("seed role failed: {error}"),
        }
    }

    /// End-to-end wiring: grant through the lifecycle service, observe the
    /// permission through the resolver, revoke, observe it disappear.
    #[tokio::test]
    async fn grant_resolve_revoke_round_trip() {
        let repository = Arc::new(InMemorySecurityRepository::new());
        let audit_repository = Arc::new(InMemoryAuditRepository::new());
        let authorization_service = AuthorizationService::new(repository.clone());
        let assignment_service = AssignmentService::new(
            authorization_service.clone(),
            repository.clone(),
            repository.clone(),
            audit_repository.clone(),
        );

        let company_id = CompanyId::new();
        let admin = Principal::new(UserId::new(), company_id, FixedRole::Admin);
        let member = Principal::new(UserId::new(), company_id, FixedRole::User);
        let now = Utc::now();

        let role = seeded_role(company_id, &[Permission::ExpensesApprove]);
        let created = repository.create_role(role).await;
        let role = match created {
            Ok(role) => role,
            Err(error) => panic!("create failed: {error}"),
        };

        let before = authorization_service
            .has_permission(&member, company_id, Permission::ExpensesApprove, now)
            .await;
        assert_eq!(before.ok(), Some(false));

        let assignment = match assignment_service
            .grant(
                &admin,
                GrantInput {
                    user_id: member.user_id(),
                    custom_role_id: role.id,
                    company_id,
                    expires_at: None,
                },
                now,
            )
            .await
        {
            Ok(assignment) => assignment,
            Err(error) => panic!("grant failed: {error}"),
        };

        let granted = authorization_service
            .has_permission(&member, company_id, Permission::ExpensesApprove, now)
            .await;
        assert_eq!(granted.ok(), Some(true));

        // Foreign company still resolves to nothing.
        let abroad = authorization_service
            .has_permission(&member, CompanyId::new(), Permission::ExpensesApprove, now)
            .await;
        assert_eq!(abroad.ok(), Some(false));

        let revoked = assignment_service.revoke(&admin, assignment.id).await;
        assert!(revoked.is_ok());

        let after = authorization_service
            .has_permission(&member, company_id, Permission::ExpensesApprove, now)
            .await;
        assert_eq!(after.ok(), Some(false));
    }

    #[tokio::test]
    async fn expired_assignment_no_longer_resolves() {
        let repository = Arc::new(InMemorySecurityRepository::new());
        let audit_repository = Arc::new(InMemoryAuditRepository::new());
        let authorization_service = AuthorizationService::new(repository.clone());
        let assignment_service = AssignmentService::new(
            authorization_service.clone(),
            repository.clone(),
            repository.clone(),
            audit_repository,
        );

        let company_id = CompanyId::new();
        let admin = Principal::new(UserId::new(), company_id, FixedRole::Admin);
        let member = Principal::new(UserId::new(), company_id, FixedRole::User);
        let now = Utc::now();

        let role = seeded_role(company_id, &[Permission::ExpensesApprove]);
        let created = repository.create_role(role).await;
        let role = match created {
            Ok(role) => role,
            Err(error) => panic!("create failed: {error}"),
        };

        let granted = assignment_service
            .grant(
                &admin,
                GrantInput {
                    user_id: member.user_id(),
                    custom_role_id: role.id,
                    company_id,
                    expires_at: Some(now + Duration::minutes(5)),
                },
                now,
            )
            .await;
        assert!(granted.is_ok());

        let within_window = authorization_service
            .has_permission(&member, company_id, Permission::ExpensesApprove, now)
            .await;
        assert_eq!(within_window.ok(), Some(true));

        let after_window = authorization_service
            .has_permission(
                &member,
                company_id,
                Permission::ExpensesApprove,
                now + Duration::minutes(6),
            )
            .await;
        assert_eq!(after_window.ok(), Some(false));
    }

    #[tokio::test]
    async fn update_rejects_rename_into_existing_name() {
        let repository = InMemorySecurityRepository::new();
        let company_id = CompanyId::new();

        let approver = seeded_role(company_id, &[Permission::ExpensesApprove]);
        let created = repository.create_role(approver.clone()).await;
        assert!(created.is_ok());

        let viewer = match CustomRole::new(
            company_id,
            "expense-viewer",
            BTreeSet::from([Permission::ExpensesView]),
            None,
            Utc::now(),
        ) {
            Ok(role) => role,
            Err(error) => panic!("seed role failed: {error}"),
        };
        let created = repository.create_role(viewer.clone()).await;
        assert!(created.is_ok());

        let mut renamed = viewer;
        renamed.name = approver.name;
        let result = repository.update_role(renamed).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn disabling_a_role_cascades_into_resolution() {
        let repository = Arc::new(InMemorySecurityRepository::new());
        let audit_repository = Arc::new(InMemoryAuditRepository::new());
        let authorization_service = AuthorizationService::new(repository.clone());
        let assignment_service = AssignmentService::new(
            authorization_service.clone(),
            repository.clone(),
            repository.clone(),
            audit_repository.clone(),
        );
        let role_admin_service = RoleAdminService::new(
            authorization_service.clone(),
            repository.clone(),
            repository.clone(),
            audit_repository,
        );

        let company_id = CompanyId::new();
        let admin = Principal::new(UserId::new(), company_id, FixedRole::Admin);
        let member = Principal::new(UserId::new(), company_id, FixedRole::User);
        let now = Utc::now();

        let role = seeded_role(company_id, &[Permission::GlAccountsView]);
        let created = repository.create_role(role).await;
        let role = match created {
            Ok(role) => role,
            Err(error) => panic!("create failed: {error}"),
        };

        let granted = assignment_service
            .grant(
                &admin,
                GrantInput {
                    user_id: member.user_id(),
                    custom_role_id: role.id,
                    company_id,
                    expires_at: None,
                },
                now,
            )
            .await;
        assert!(granted.is_ok());

        let disabled = role_admin_service.disable_role(&admin, role.id).await;
        assert!(disabled.is_ok());

        let after = authorization_service
            .has_permission(&member, company_id, Permission::GlAccountsView, now)
            .await;
        assert_eq!(after.ok(), Some(false));

        // The cascade freed the uniqueness slot, but the disabled role
        // itself refuses new grants.
        let regrant = assignment_service
            .grant(
                &admin,
                GrantInput {
                    user_id: member.user_id(),
                    custom_role_id: role.id,
                    company_id,
                    expires_at: None,
                },
                now,
            )
            .await;
        assert!(matches!(regrant, Err(AppError::Conflict(_))));
    }
}
