use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by authorization use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a custom role is created.
    RoleCreated,
    /// Emitted when a custom role is renamed or its grants change.
    RoleUpdated,
    /// Emitted when a custom role is soft-disabled.
    RoleDisabled,
    /// Emitted when a role is granted to a principal.
    AssignmentGranted,
    /// Emitted when an assignment is explicitly revoked.
    AssignmentRevoked,
    /// Emitted when an assignment's validity window is extended.
    AssignmentRenewed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "security.role.created",
            Self::RoleUpdated => "security.role.updated",
            Self::RoleDisabled => "security.role.disabled",
            Self::AssignmentGranted => "security.assignment.granted",
            Self::AssignmentRevoked => "security.assignment.revoked",
            Self::AssignmentRenewed => "security.assignment.renewed",
        }
    }
}
