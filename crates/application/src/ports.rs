mod assignments;
mod audit;
mod roles;

pub use assignments::AssignmentRepository;
pub use audit::{AuditEvent, AuditRepository};
pub use roles::{CreateRoleInput, RoleRepository, UpdateRoleInput};
