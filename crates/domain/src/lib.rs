//! Domain entities and invariants for the authorization engine.

#![forbid(unsafe_code)]

mod assignment;
mod audit;
mod permission;
mod role;

pub use assignment::{AssignmentId, AssignmentState, RoleAssignment};
pub use audit::AuditAction;
pub use permission::Permission;
pub use role::{CustomRole, EffectivePermissionSet, RoleGrant, RoleId, fixed_role_grant};
