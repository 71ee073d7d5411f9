use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spenvia_core::{AppError, AppResult, CompanyId, FixedRole, Principal, UserId};
use spenvia_domain::{EffectivePermissionSet, Permission, fixed_role_grant};

/// Repository port for the resolver's assignment-grant read.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Lists permissions granted to a user through custom-role assignments
    /// that are active and unexpired at `now`. Assignments whose role has
    /// been disabled contribute nothing.
    async fn list_assignment_permissions(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Permission>>;
}

/// Company-scoped permission resolution and the guard primitives built on it.
///
/// Resolution is a pure read: identical inputs (including `now`) yield
/// identical results and no observable state changes.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Computes the effective permission set a principal holds in one company.
    ///
    /// Super-admins receive the all-permissions sentinel for every company.
    /// Any other principal targeting a foreign company receives the empty
    /// set before any assignment lookup happens, so no company-scoped data
    /// leaks through timing or partial results. Absence of permissions is
    /// the empty set, never an error.
    pub async fn resolve(
        &self,
        principal: &Principal,
        target_company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> AppResult<EffectivePermissionSet> {
        if principal.is_super_admin() {
            return Ok(EffectivePermissionSet::All);
        }

        if target_company_id != principal.home_company_id() {
            return Ok(EffectivePermissionSet::empty());
        }

        let mut effective =
            EffectivePermissionSet::from_grant(fixed_role_grant(principal.fixed_role()));
        let assigned = self
            .repository
            .list_assignment_permissions(principal.user_id(), target_company_id, now)
            .await?;
        effective.extend(assigned);

        Ok(effective)
    }

    /// Returns whether the principal holds the permission in the company.
    pub async fn has_permission(
        &self,
        principal: &Principal,
        target_company_id: CompanyId,
        permission: Permission,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let effective = self.resolve(principal, target_company_id, now).await?;
        Ok(effective.contains(permission))
    }

    /// Ensures the principal holds the permission in the company.
    ///
    /// The denial message deliberately carries no detail about which roles
    /// or permissions exist.
    pub async fn require_permission(
        &self,
        principal: &Principal,
        target_company_id: CompanyId,
        permission: Permission,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self
            .has_permission(principal, target_company_id, permission, now)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::Forbidden("insufficient permission".to_owned()))
        }
    }

    /// Ensures the principal's built-in role is one of `allowed`.
    ///
    /// Compares the fixed role directly; no resolver, no company scoping.
    /// Gates structural operations such as role and assignment
    /// administration.
    pub fn require_fixed_role(
        &self,
        principal: &Principal,
        allowed: &[FixedRole],
    ) -> AppResult<()> {
        if allowed.contains(&principal.fixed_role()) {
            Ok(())
        } else {
            Err(AppError::Forbidden("insufficient permission".to_owned()))
        }
    }

    /// Resolves the company a request acts against.
    ///
    /// Only a super-admin may target a company other than their own; for
    /// everyone else a foreign `requested_company_id` silently falls back to
    /// the home company. Mutating services re-check company ownership and
    /// fail loud, so the fallback can never redirect a write.
    #[must_use]
    pub fn resolve_tenant_context(
        &self,
        principal: &Principal,
        requested_company_id: Option<CompanyId>,
    ) -> CompanyId {
        match requested_company_id {
            Some(requested) if principal.is_super_admin() => requested,
            _ => principal.home_company_id(),
        }
    }
}
