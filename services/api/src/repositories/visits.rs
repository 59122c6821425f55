//! Visit repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use common::{error::DatabaseResult, pagination::PageRequest};

use crate::models::visit::{NewVisit, Progress, Visit, VisitAction, VisitFilter, VisitStatus};

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn create(&self, visit: &NewVisit, scheduled_by: Uuid) -> DatabaseResult<Visit>;

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Visit>>;

    async fn list(
        &self,
        filter: &VisitFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Visit>, i64)>;

    /// Persist the schedule fields of `visit`
    async fn update(&self, visit: &Visit) -> DatabaseResult<Option<Visit>>;

    async fn set_status(&self, id: Uuid, status: VisitStatus) -> DatabaseResult<Option<Visit>>;

    /// Move an active visit from `expected` to `next`, recording `actor`.
    ///
    /// Returns `None` when the visit is gone, no longer active, or its
    /// progress is no longer `expected`.
    async fn transition(
        &self,
        id: Uuid,
        expected: Progress,
        next: Progress,
        action: VisitAction,
        actor: Uuid,
    ) -> DatabaseResult<Option<Visit>>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

const VISIT_COLUMNS: &str = "id, user_id, patient_id, start_time, end_time, note, progress, \
                             status, scheduled_by, checkin_by, checkout_by, canceled_by, \
                             approved_by, created_at, updated_at";

const VISIT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR user_id = $1)
      AND ($2::uuid IS NULL OR patient_id = $2)
      AND ($3::smallint IS NULL OR progress = $3)
      AND ($4::timestamp IS NULL OR start_time >= $4)
      AND ($5::timestamp IS NULL OR start_time < $5)
      AND ($6 OR status = 1)
"#;

#[derive(Clone)]
pub struct PgVisitRepository {
    pool: PgPool,
}

impl PgVisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn create(&self, visit: &NewVisit, scheduled_by: Uuid) -> DatabaseResult<Visit> {
        info!(
            "Scheduling visit of {} to patient {}",
            visit.user_id, visit.patient_id
        );

        let created = sqlx::query_as::<_, Visit>(&format!(
            r#"
            INSERT INTO visits
                (id, user_id, patient_id, start_time, end_time, note, progress, status, scheduled_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {VISIT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(visit.user_id)
        .bind(visit.patient_id)
        .bind(visit.start_time)
        .bind(visit.end_time)
        .bind(&visit.note)
        .bind(Progress::Scheduled)
        .bind(VisitStatus::Active)
        .bind(scheduled_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(visit)
    }

    async fn list(
        &self,
        filter: &VisitFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Visit>, i64)> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits {VISIT_FILTER} \
             ORDER BY start_time, id LIMIT $7 OFFSET $8"
        ))
        .bind(filter.user_id)
        .bind(filter.patient_id)
        .bind(filter.progress)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.include_archived)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM visits {VISIT_FILTER}"))
            .bind(filter.user_id)
            .bind(filter.patient_id)
            .bind(filter.progress)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.include_archived)
            .fetch_one(&self.pool)
            .await?;

        Ok((visits, total))
    }

    async fn update(&self, visit: &Visit) -> DatabaseResult<Option<Visit>> {
        info!("Updating visit {}", visit.id);

        let updated = sqlx::query_as::<_, Visit>(&format!(
            r#"
            UPDATE visits
            SET user_id = $2, patient_id = $3, start_time = $4, end_time = $5, note = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VISIT_COLUMNS}
            "#
        ))
        .bind(visit.id)
        .bind(visit.user_id)
        .bind(visit.patient_id)
        .bind(visit.start_time)
        .bind(visit.end_time)
        .bind(&visit.note)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn set_status(&self, id: Uuid, status: VisitStatus) -> DatabaseResult<Option<Visit>> {
        info!("Setting visit {} status to {:?}", id, status);

        let visit = sqlx::query_as::<_, Visit>(&format!(
            "UPDATE visits SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {VISIT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(visit)
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: Progress,
        next: Progress,
        action: VisitAction,
        actor: Uuid,
    ) -> DatabaseResult<Option<Visit>> {
        let audit_column = action.audit_column();

        let visit = sqlx::query_as::<_, Visit>(&format!(
            r#"
            UPDATE visits
            SET progress = $3, {audit_column} = $4, updated_at = NOW()
            WHERE id = $1 AND progress = $2 AND status = 1
            RETURNING {VISIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;

        if visit.is_some() {
            info!("Visit {} moved from {} to {} by {}", id, expected, next, actor);
        }
        Ok(visit)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting visit {}", id);

        let result = sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
