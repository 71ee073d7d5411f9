//! Application services and ports for the authorization engine.

#![forbid(unsafe_code)]

mod assignment_service;
mod authorization_service;
mod ports;
mod role_admin_service;

pub use assignment_service::{AssignmentService, GrantInput};
pub use authorization_service::{AuthorizationRepository, AuthorizationService};
pub use ports::{
    AssignmentRepository, AuditEvent, AuditRepository, CreateRoleInput, RoleRepository,
    UpdateRoleInput,
};
pub use role_admin_service::RoleAdminService;
