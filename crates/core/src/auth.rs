use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, CompanyId, UserId};

/// Built-in roles with statically defined permission grants.
///
/// `SuperAdmin` is the only role that crosses company boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixedRole {
    /// Regular member of a company.
    User,
    /// Finance controller with read access across company ledgers.
    Controller,
    /// Company administrator.
    Admin,
    /// Cross-company administrator with an implicit all-permissions grant.
    SuperAdmin,
}

impl FixedRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Controller => "controller",
            Self::Admin => "admin",
            Self::SuperAdmin => "super-admin",
        }
    }

    /// Returns all built-in roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[FixedRole] = &[
            FixedRole::User,
            FixedRole::Controller,
            FixedRole::Admin,
            FixedRole::SuperAdmin,
        ];

        ALL
    }
}

impl FromStr for FixedRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "controller" => Ok(Self::Controller),
            "admin" => Ok(Self::Admin),
            "super-admin" => Ok(Self::SuperAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown fixed role value '{value}'"
            ))),
        }
    }
}

/// Authenticated actor supplied by the authentication collaborator.
///
/// Immutable for the duration of a request; the engine trusts it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    user_id: UserId,
    home_company_id: CompanyId,
    fixed_role: FixedRole,
}

impl Principal {
    /// Creates a principal from authentication and tenancy data.
    #[must_use]
    pub fn new(user_id: UserId, home_company_id: CompanyId, fixed_role: FixedRole) -> Self {
        Self {
            user_id,
            home_company_id,
            fixed_role,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the company the principal belongs to.
    #[must_use]
    pub fn home_company_id(&self) -> CompanyId {
        self.home_company_id
    }

    /// Returns the built-in role attached to the principal.
    #[must_use]
    pub fn fixed_role(&self) -> FixedRole {
        self.fixed_role
    }

    /// Returns whether the principal holds the cross-company override role.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.fixed_role == FixedRole::SuperAdmin
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::FixedRole;

    #[test]
    fn fixed_role_roundtrip_storage_value() {
        for role in FixedRole::all() {
            let restored = FixedRole::from_str(role.as_str());
            assert_eq!(restored.ok(), Some(*role));
        }
    }

    #[test]
    fn unknown_fixed_role_is_rejected() {
        assert!(FixedRole::from_str("owner").is_err());
    }
}
