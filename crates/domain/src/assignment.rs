use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spenvia_core::{CompanyId, UserId};
use uuid::Uuid;

use crate::RoleId;

/// Unique identifier for a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentId(Uuid);

impl AssignmentId {
    /// Creates a new random assignment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an assignment identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AssignmentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle state of an assignment at a given instant.
///
/// `Revoked` and `ActiveExpired` are both terminal with respect to granting
/// permissions, but stay distinguishable so the audit trail can tell a
/// time-out apart from a deliberate revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Active and within its validity window.
    ActiveValid,
    /// Still flagged active but past its expiry; inert for resolution.
    ActiveExpired,
    /// Explicitly deactivated.
    Revoked,
}

/// Time-bounded link between a principal and a custom role within a company.
///
/// Rows are never hard-deleted; revocation flips `is_active` and expiry is a
/// computed property, so history survives for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Stable assignment identifier.
    pub id: AssignmentId,
    /// Principal receiving the role.
    pub user_id: UserId,
    /// Custom role being assigned.
    pub custom_role_id: RoleId,
    /// Company scope; must equal the custom role's company.
    pub company_id: CompanyId,
    /// Principal that performed the grant.
    pub assigned_by: UserId,
    /// Grant timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Optional end of the validity window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Explicit revocation flag.
    pub is_active: bool,
}

impl RoleAssignment {
    /// Returns whether the validity window has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns whether the assignment contributes permissions at `now`.
    #[must_use]
    pub fn grants_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> AssignmentState {
        if !self.is_active {
            AssignmentState::Revoked
        } else if self.is_expired(now) {
            AssignmentState::ActiveExpired
        } else {
            AssignmentState::ActiveValid
        }
    }
}
