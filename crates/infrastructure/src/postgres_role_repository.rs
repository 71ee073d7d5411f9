use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use spenvia_application::RoleRepository;
use spenvia_core::{AppError, AppResult, CompanyId, NonEmptyString};
use spenvia_domain::{CustomRole, Permission, RoleId};

/// PostgreSQL-backed repository for custom-role records.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: uuid::Uuid,
    company_id: uuid::Uuid,
    name: String,
    description: Option<String>,
    is_disabled: bool,
    created_at: DateTime<Utc>,
    permission: Option<String>,
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn create_role(&self, role: CustomRole) -> AppResult<CustomRole> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::Storage(format!("failed to begin transaction: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO custom_roles (id, company_id, name, description, is_disabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.company_id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.description.as_deref())
        .bind(role.is_disabled)
        .bind(role.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_name_conflict(error, role.name.as_str()))?;

        persist_role_permissions(&mut transaction, role.id, &role.permissions).await?;

        transaction
            .commit()
            .await
            .map_err(|error| AppError::Storage(format!("failed to commit transaction: {error}")))?;

        Ok(role)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<CustomRole>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.company_id,
                roles.name,
                roles.description,
                roles.is_disabled,
                roles.created_at,
                role_permissions.permission
            FROM custom_roles AS roles
            LEFT JOIN custom_role_permissions AS role_permissions
                ON role_permissions.role_id = roles.id
            WHERE roles.id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to load role: {error}")))?;

        let mut roles = aggregate_roles(rows)?;
        Ok(roles.pop())
    }

    async fn update_role(&self, role: CustomRole) -> AppResult<CustomRole> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::Storage(format!("failed to begin transaction: {error}")))?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE custom_roles
            SET name = $2, description = $3, is_disabled = $4
            WHERE id = $1
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.description.as_deref())
        .bind(role.is_disabled)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_name_conflict(error, role.name.as_str()))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id
            )));
        }

        sqlx::query("DELETE FROM custom_role_permissions WHERE role_id = $1")
            .bind(role.id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to clear role grants: {error}"))
            })?;

        persist_role_permissions(&mut transaction, role.id, &role.permissions).await?;

        transaction
            .commit()
            .await
            .map_err(|error| AppError::Storage(format!("failed to commit transaction: {error}")))?;

        Ok(role)
    }

    async fn list_roles(&self, company_id: CompanyId) -> AppResult<Vec<CustomRole>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.company_id,
                roles.name,
                roles.description,
                roles.is_disabled,
                roles.created_at,
                role_permissions.permission
            FROM custom_roles AS roles
            LEFT JOIN custom_role_permissions AS role_permissions
                ON role_permissions.role_id = roles.id
            WHERE roles.company_id = $1
            ORDER BY roles.name, role_permissions.permission
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }
}

async fn persist_role_permissions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    permissions: &BTreeSet<Permission>,
) -> AppResult<()> {
    for permission in permissions {
        sqlx::query(
            r#"
            INSERT INTO custom_role_permissions (role_id, permission)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission.as_str())
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Storage(format!("failed to persist role grants: {error}")))?;
    }

    Ok(())
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<CustomRole>> {
    let mut by_id: HashMap<uuid::Uuid, CustomRole> = HashMap::new();
    let mut order: Vec<uuid::Uuid> = Vec::new();

    for row in rows {
        let entry = match by_id.entry(row.role_id) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let name = NonEmptyString::new(row.name.clone()).map_err(|error| {
                    AppError::Storage(format!(
                        "failed to decode role '{}': {error}",
                        row.role_id
                    ))
                })?;
                order.push(row.role_id);
                vacant.insert(CustomRole {
                    id: RoleId::from_uuid(row.role_id),
                    company_id: CompanyId::from_uuid(row.company_id),
                    name,
                    permissions: BTreeSet::new(),
                    description: row.description.clone(),
                    is_disabled: row.is_disabled,
                    created_at: row.created_at,
                })
            }
        };

        if let Some(permission) = &row.permission {
            let permission = Permission::from_str(permission).map_err(|error| {
                AppError::Storage(format!(
                    "failed to decode permission '{permission}' on role '{}': {error}",
                    row.role_id
                ))
            })?;
            entry.permissions.insert(permission);
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|role_id| by_id.remove(&role_id))
        .collect())
}

fn map_role_name_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Storage(format!("failed to persist role: {error}"))
}
