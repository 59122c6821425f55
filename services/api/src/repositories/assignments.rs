//! Caregiver assignment repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use common::{error::DatabaseResult, pagination::PageRequest};

use crate::models::assignment::{Assignment, AssignmentFilter, AssignmentStatus, NewAssignment};

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &NewAssignment, assigned_by: Uuid) -> DatabaseResult<Assignment>;

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Assignment>>;

    async fn list(
        &self,
        filter: &AssignmentFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Assignment>, i64)>;

    async fn update_notes(&self, id: Uuid, notes: Option<&str>) -> DatabaseResult<Option<Assignment>>;

    async fn set_status(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> DatabaseResult<Option<Assignment>>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;

    /// Patients actively assigned to `user_id`
    async fn assigned_patients(&self, user_id: Uuid) -> DatabaseResult<Vec<Uuid>>;

    async fn is_assigned(&self, user_id: Uuid, patient_id: Uuid) -> DatabaseResult<bool>;
}

const ASSIGNMENT_COLUMNS: &str =
    "id, user_id, patient_id, assigned_by, notes, status, created_at, updated_at";

const ASSIGNMENT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR user_id = $1)
      AND ($2::uuid IS NULL OR patient_id = $2)
      AND ($3 OR status = 1)
"#;

#[derive(Clone)]
pub struct PgAssignmentRepository {
    pool: PgPool,
}

impl PgAssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssignmentRepository for PgAssignmentRepository {
    async fn create(&self, assignment: &NewAssignment, assigned_by: Uuid) -> DatabaseResult<Assignment> {
        info!(
            "Assigning caregiver {} to patient {}",
            assignment.user_id, assignment.patient_id
        );

        let created = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO user_patients (id, user_id, patient_id, assigned_by, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(assignment.user_id)
        .bind(assignment.patient_id)
        .bind(assigned_by)
        .bind(&assignment.notes)
        .bind(AssignmentStatus::Active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM user_patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn list(
        &self,
        filter: &AssignmentFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Assignment>, i64)> {
        let assignments = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM user_patients {ASSIGNMENT_FILTER} \
             ORDER BY created_at, id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.user_id)
        .bind(filter.patient_id)
        .bind(filter.include_inactive)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM user_patients {ASSIGNMENT_FILTER}"
        ))
        .bind(filter.user_id)
        .bind(filter.patient_id)
        .bind(filter.include_inactive)
        .fetch_one(&self.pool)
        .await?;

        Ok((assignments, total))
    }

    async fn update_notes(&self, id: Uuid, notes: Option<&str>) -> DatabaseResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "UPDATE user_patients SET notes = $2, updated_at = NOW() WHERE id = $1 RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> DatabaseResult<Option<Assignment>> {
        info!("Setting assignment {} status to {:?}", id, status);

        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "UPDATE user_patients SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting assignment {}", id);

        let result = sqlx::query("DELETE FROM user_patients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assigned_patients(&self, user_id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT patient_id FROM user_patients WHERE user_id = $1 AND status = 1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_assigned(&self, user_id: Uuid, patient_id: Uuid) -> DatabaseResult<bool> {
        let assigned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_patients
                WHERE user_id = $1 AND patient_id = $2 AND status = 1
            )
            "#,
        )
        .bind(user_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assigned)
    }
}
