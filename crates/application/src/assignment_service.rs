use std::sync::Arc;

use chrono::{DateTime, Utc};
use spenvia_core::{AppError, AppResult, CompanyId, FixedRole, Principal, UserId};
use spenvia_domain::{
    AssignmentId, AssignmentState, AuditAction, RoleAssignment, RoleId,
};

use crate::{
    AssignmentRepository, AuditEvent, AuditRepository, AuthorizationService, RoleRepository,
};

const ASSIGNMENT_ADMIN_ROLES: &[FixedRole] = &[FixedRole::Admin, FixedRole::SuperAdmin];

/// Input payload for granting a custom role to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantInput {
    /// Principal receiving the role.
    pub user_id: UserId,
    /// Custom role being granted.
    pub custom_role_id: RoleId,
    /// Company scope for the assignment.
    pub company_id: CompanyId,
    /// Optional end of the validity window.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Application service for the role-assignment lifecycle.
///
/// Every operation is a bounded read or a single bounded write; the
/// duplicate-grant invariant is enforced atomically by the assignment store,
/// never by a read-then-write here.
#[derive(Clone)]
pub struct AssignmentService {
    authorization_service: AuthorizationService,
    role_repository: Arc<dyn RoleRepository>,
    assignment_repository: Arc<dyn AssignmentRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl AssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        role_repository: Arc<dyn RoleRepository>,
        assignment_repository: Arc<dyn AssignmentRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization_service,
            role_repository,
            assignment_repository,
            audit_repository,
        }
    }

    /// Grants a custom role to a principal.
    ///
    /// Mutations fail loud on suspicious company input: a non-super-admin
    /// targeting a foreign company is rejected outright rather than silently
    /// redirected, and a role owned by a different company than the
    /// assignment is a cross-tenant violation.
    pub async fn grant(
        &self,
        actor: &Principal,
        input: GrantInput,
        now: DateTime<Utc>,
    ) -> AppResult<RoleAssignment> {
        self.authorization_service
            .require_fixed_role(actor, ASSIGNMENT_ADMIN_ROLES)?;

        if !actor.is_super_admin() && input.company_id != actor.home_company_id() {
            return Err(AppError::Forbidden("insufficient permission".to_owned()));
        }

        if let Some(expires_at) = input.expires_at
            && expires_at <= now
        {
            return Err(AppError::Validation(
                "expiry timestamp must be in the future".to_owned(),
            ));
        }

        let role = self
            .role_repository
            .find_role(input.custom_role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{}' was not found", input.custom_role_id))
            })?;

        if role.company_id != input.company_id {
            tracing::warn!(
                role_id = %role.id,
                role_company_id = %role.company_id,
                assignment_company_id = %input.company_id,
                "rejected cross-tenant role assignment"
            );
            return Err(AppError::CrossTenant(format!(
                "role '{}' does not belong to company '{}'",
                role.id, input.company_id
            )));
        }

        if role.is_disabled {
            return Err(AppError::Conflict(format!(
                "role '{}' is disabled",
                role.id
            )));
        }

        let assignment = RoleAssignment {
            id: AssignmentId::new(),
            user_id: input.user_id,
            custom_role_id: input.custom_role_id,
            company_id: input.company_id,
            assigned_by: actor.user_id(),
            assigned_at: now,
            expires_at: input.expires_at,
            is_active: true,
        };

        let assignment = self
            .assignment_repository
            .insert_assignment(assignment, now)
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                company_id: assignment.company_id,
                actor: actor.user_id(),
                action: AuditAction::AssignmentGranted,
                resource_type: "role_assignment".to_owned(),
                resource_id: assignment.id.to_string(),
                detail: Some(format!(
                    "granted role '{}' to user '{}'",
                    assignment.custom_role_id, assignment.user_id
                )),
            })
            .await?;

        Ok(assignment)
    }

    /// Revokes an assignment by flipping its active flag; the row survives
    /// for audit. Idempotent: revoking an already-inactive assignment
    /// returns the current state without emitting another audit event.
    pub async fn revoke(
        &self,
        actor: &Principal,
        assignment_id: AssignmentId,
    ) -> AppResult<RoleAssignment> {
        self.authorization_service
            .require_fixed_role(actor, ASSIGNMENT_ADMIN_ROLES)?;

        let mut assignment = self.find_scoped_assignment(actor, assignment_id).await?;
        if !assignment.is_active {
            return Ok(assignment);
        }

        assignment.is_active = false;
        let assignment = self
            .assignment_repository
            .update_assignment(assignment)
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                company_id: assignment.company_id,
                actor: actor.user_id(),
                action: AuditAction::AssignmentRevoked,
                resource_type: "role_assignment".to_owned(),
                resource_id: assignment.id.to_string(),
                detail: Some(format!(
                    "revoked role '{}' from user '{}'",
                    assignment.custom_role_id, assignment.user_id
                )),
            })
            .await?;

        Ok(assignment)
    }

    /// Extends the validity window of an assignment that is still active and
    /// unexpired. Lapsed or revoked assignments require a fresh grant.
    pub async fn renew(
        &self,
        actor: &Principal,
        assignment_id: AssignmentId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<RoleAssignment> {
        self.authorization_service
            .require_fixed_role(actor, ASSIGNMENT_ADMIN_ROLES)?;

        if new_expires_at <= now {
            return Err(AppError::Validation(
                "expiry timestamp must be in the future".to_owned(),
            ));
        }

        let mut assignment = self.find_scoped_assignment(actor, assignment_id).await?;
        match assignment.state(now) {
            AssignmentState::ActiveValid => {}
            AssignmentState::ActiveExpired => {
                return Err(AppError::Conflict(format!(
                    "assignment '{assignment_id}' has expired and needs a new grant"
                )));
            }
            AssignmentState::Revoked => {
                return Err(AppError::Conflict(format!(
                    "assignment '{assignment_id}' is revoked and needs a new grant"
                )));
            }
        }

        assignment.expires_at = Some(new_expires_at);
        let assignment = self
            .assignment_repository
            .update_assignment(assignment)
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                company_id: assignment.company_id,
                actor: actor.user_id(),
                action: AuditAction::AssignmentRenewed,
                resource_type: "role_assignment".to_owned(),
                resource_id: assignment.id.to_string(),
                detail: Some(format!("renewed until {new_expires_at}")),
            })
            .await?;

        Ok(assignment)
    }

    /// Lists assignments in the actor's effective company, optionally
    /// filtered to a single user.
    pub async fn list_assignments(
        &self,
        actor: &Principal,
        requested_company_id: Option<CompanyId>,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.authorization_service
            .require_fixed_role(actor, ASSIGNMENT_ADMIN_ROLES)?;

        let company_id = self
            .authorization_service
            .resolve_tenant_context(actor, requested_company_id);

        self.assignment_repository
            .list_assignments(company_id, user_id)
            .await
    }

    /// Loads an assignment the actor is allowed to administer. Rows owned by
    /// a foreign company read as missing so their existence does not leak.
    async fn find_scoped_assignment(
        &self,
        actor: &Principal,
        assignment_id: AssignmentId,
    ) -> AppResult<RoleAssignment> {
        let assignment = self
            .assignment_repository
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("assignment '{assignment_id}' was not found"))
            })?;

        if !actor.is_super_admin() && assignment.company_id != actor.home_company_id() {
            return Err(AppError::NotFound(format!(
                "assignment '{assignment_id}' was not found"
            )));
        }

        Ok(assignment)
    }
}
