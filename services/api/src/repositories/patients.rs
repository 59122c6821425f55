//! Patient repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use common::{error::DatabaseResult, pagination::PageRequest};

use crate::models::patient::{NewPatient, Patient, PatientFilter, PatientStatus, UpdatePatient};

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create(&self, patient: &NewPatient) -> DatabaseResult<Patient>;

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Patient>>;

    async fn list(
        &self,
        filter: &PatientFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Patient>, i64)>;

    async fn update(&self, id: Uuid, changes: &UpdatePatient) -> DatabaseResult<Option<Patient>>;

    async fn set_status(&self, id: Uuid, status: PatientStatus) -> DatabaseResult<Option<Patient>>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

const PATIENT_COLUMNS: &str = "id, patient_code, admission_code, first_name, last_name, phone, \
                               status, created_at, updated_at";

const PATIENT_FILTER: &str = r#"
    WHERE ($1 OR status = 0)
      AND ($2::uuid[] IS NULL OR id = ANY($2))
"#;

#[derive(Clone)]
pub struct PgPatientRepository {
    pool: PgPool,
}

impl PgPatientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientRepository for PgPatientRepository {
    async fn create(&self, patient: &NewPatient) -> DatabaseResult<Patient> {
        info!("Creating patient {}", patient.patient_code);

        let created = sqlx::query_as::<_, Patient>(&format!(
            r#"
            INSERT INTO patients (id, patient_code, admission_code, first_name, last_name, phone, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&patient.patient_code)
        .bind(&patient.admission_code)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(&patient.phone)
        .bind(PatientStatus::Active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    async fn list(
        &self,
        filter: &PatientFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Patient>, i64)> {
        let patients = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients {PATIENT_FILTER} \
             ORDER BY last_name, first_name, id LIMIT $3 OFFSET $4"
        ))
        .bind(filter.include_archived)
        .bind(filter.ids.as_deref())
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM patients {PATIENT_FILTER}"
        ))
        .bind(filter.include_archived)
        .bind(filter.ids.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok((patients, total))
    }

    async fn update(&self, id: Uuid, changes: &UpdatePatient) -> DatabaseResult<Option<Patient>> {
        info!("Updating patient {}", id);

        let patient = sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patients
            SET patient_code = COALESCE($2, patient_code),
                admission_code = COALESCE($3, admission_code),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                phone = COALESCE($6, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.patient_code)
        .bind(&changes.admission_code)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    async fn set_status(&self, id: Uuid, status: PatientStatus) -> DatabaseResult<Option<Patient>> {
        info!("Setting patient {} status to {}", id, status);

        let patient = sqlx::query_as::<_, Patient>(&format!(
            "UPDATE patients SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting patient {}", id);

        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
