use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use spenvia_application::AuthorizationRepository;
use spenvia_core::{AppError, AppResult, CompanyId, UserId};
use spenvia_domain::Permission;

/// PostgreSQL-backed repository for the resolver's assignment-grant read.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    permission: String,
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn list_assignment_permissions(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT DISTINCT role_permissions.permission
            FROM role_assignments AS assignments
            INNER JOIN custom_roles AS roles
                ON roles.id = assignments.custom_role_id
            INNER JOIN custom_role_permissions AS role_permissions
                ON role_permissions.role_id = roles.id
            WHERE assignments.user_id = $1
                AND assignments.company_id = $2
                AND assignments.is_active
                AND (assignments.expires_at IS NULL OR assignments.expires_at > $3)
                AND NOT roles.is_disabled
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(company_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to load assignment permissions: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                Permission::from_str(row.permission.as_str()).map_err(|error| {
                    AppError::Storage(format!(
                        "failed to decode permission '{}' for company '{}': {error}",
                        row.permission, company_id
                    ))
                })
            })
            .collect()
    }
}
