use async_trait::async_trait;
use spenvia_core::{AppResult, CompanyId, UserId};
use spenvia_domain::AuditAction;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Company scope for the event.
    pub company_id: CompanyId,
    /// Principal that performed the action.
    pub actor: UserId,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type the action touched.
    pub resource_type: String,
    /// Identifier of the touched resource.
    pub resource_id: String,
    /// Optional free-form detail.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
