use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use spenvia_application::AssignmentRepository;
use spenvia_core::{AppError, AppResult, CompanyId, UserId};
use spenvia_domain::{AssignmentId, RoleAssignment, RoleId};

/// PostgreSQL-backed repository for role-assignment records.
///
/// Relies on a partial unique index over
/// `(user_id, custom_role_id, company_id) WHERE is_active` to enforce the
/// single-active-assignment invariant; a violation surfaces as a conflict.
#[derive(Clone)]
pub struct PostgresAssignmentRepository {
    pool: PgPool,
}

impl PostgresAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    custom_role_id: uuid::Uuid,
    company_id: uuid::Uuid,
    assigned_by: uuid::Uuid,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            id: AssignmentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            custom_role_id: RoleId::from_uuid(row.custom_role_id),
            company_id: CompanyId::from_uuid(row.company_id),
            assigned_by: UserId::from_uuid(row.assigned_by),
            assigned_at: row.assigned_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl AssignmentRepository for PostgresAssignmentRepository {
    async fn insert_assignment(
        &self,
        assignment: RoleAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<RoleAssignment> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| AppError::Storage(format!("failed to begin transaction: {error}")))?;

        // Lapsed rows still flagged active would trip the partial unique
        // index, so flip them first; expiry stays a computed property
        // everywhere else and this is the bookkeeping sweep for the triple.
        sqlx::query(
            r#"
            UPDATE role_assignments
            SET is_active = false
            WHERE user_id = $1
                AND custom_role_id = $2
                AND company_id = $3
                AND is_active
                AND expires_at IS NOT NULL
                AND expires_at <= $4
            "#,
        )
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.custom_role_id.as_uuid())
        .bind(assignment.company_id.as_uuid())
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to sweep lapsed assignments: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO role_assignments (
                id,
                user_id,
                custom_role_id,
                company_id,
                assigned_by,
                assigned_at,
                expires_at,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.custom_role_id.as_uuid())
        .bind(assignment.company_id.as_uuid())
        .bind(assignment.assigned_by.as_uuid())
        .bind(assignment.assigned_at)
        .bind(assignment.expires_at)
        .bind(assignment.is_active)
        .execute(&mut *transaction)
        .await
        .map_err(map_duplicate_assignment)?;

        transaction
            .commit()
            .await
            .map_err(|error| AppError::Storage(format!("failed to commit transaction: {error}")))?;

        Ok(assignment)
    }

    async fn find_assignment(&self, id: AssignmentId) -> AppResult<Option<RoleAssignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, user_id, custom_role_id, company_id, assigned_by,
                   assigned_at, expires_at, is_active
            FROM role_assignments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to load assignment: {error}")))?;

        Ok(row.map(RoleAssignment::from))
    }

    async fn update_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE role_assignments
            SET expires_at = $2, is_active = $3
            WHERE id = $1
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.expires_at)
        .bind(assignment.is_active)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to update assignment: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "assignment '{}' was not found",
                assignment.id
            )));
        }

        Ok(assignment)
    }

    async fn list_assignments(
        &self,
        company_id: CompanyId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, user_id, custom_role_id, company_id, assigned_by,
                   assigned_at, expires_at, is_active
            FROM role_assignments
            WHERE company_id = $1
                AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY assigned_at DESC, id
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(user_id.map(|user_id| user_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list assignments: {error}")))?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }

    async fn deactivate_assignments_for_role(
        &self,
        company_id: CompanyId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE role_assignments
            SET is_active = false
            WHERE company_id = $1
                AND custom_role_id = $2
                AND is_active
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to deactivate role assignments: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected)
    }
}

fn map_duplicate_assignment(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(
            "an active assignment already exists for this user and role".to_owned(),
        );
    }

    AppError::Storage(format!("failed to insert assignment: {error}"))
}
