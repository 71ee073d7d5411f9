//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_security_repository;
mod postgres_assignment_repository;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod postgres_role_repository;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_security_repository::InMemorySecurityRepository;
pub use postgres_assignment_repository::PostgresAssignmentRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_role_repository::PostgresRoleRepository;
