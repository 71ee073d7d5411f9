use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spenvia_core::{AppResult, CompanyId, UserId};
use spenvia_domain::{AssignmentId, RoleAssignment, RoleId};

/// Repository port for role-assignment records.
///
/// Assignment rows are append-then-update only; nothing here hard-deletes,
/// so revoked and lapsed assignments remain available for audit.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Persists a new assignment.
    ///
    /// The store must enforce the at-most-one active, non-expired assignment
    /// per `(user_id, custom_role_id, company_id)` invariant atomically and
    /// report a violation as a conflict; two racing inserts for the same
    /// triple must not both succeed.
    async fn insert_assignment(
        &self,
        assignment: RoleAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<RoleAssignment>;

    /// Finds an assignment by identifier, regardless of company.
    async fn find_assignment(&self, id: AssignmentId) -> AppResult<Option<RoleAssignment>>;

    /// Persists changes to an existing assignment.
    async fn update_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment>;

    /// Lists assignments in company scope, optionally filtered to one user.
    async fn list_assignments(
        &self,
        company_id: CompanyId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Deactivates every active assignment referencing a role and returns
    /// how many rows changed. Used when a role is disabled.
    async fn deactivate_assignments_for_role(
        &self,
        company_id: CompanyId,
        role_id: RoleId,
    ) -> AppResult<u64>;
}
