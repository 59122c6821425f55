//! User profile repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use common::{error::DatabaseResult, pagination::PageRequest};

use crate::models::user::{UserChanges, UserFilter, UserRecord};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// One page of profiles plus the total number of matches
    async fn list(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<UserRecord>, i64)>;

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<UserRecord>>;

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<UserRecord>>;

    /// Remove the account; the profile cascades
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

const USER_SELECT: &str = r#"
    SELECT u.id, a.username, a.role, a.status, u.first_name, u.last_name,
           u.birthdate, u.ssn, u.email, u.phone, u.photo_url,
           u.created_at, u.updated_at
    FROM users u
    JOIN auths a ON a.id = u.id
"#;

const USER_FILTER: &str = r#"
    WHERE ($1::smallint IS NULL OR a.role = $1)
      AND ($2 OR a.status NOT IN (2, 3))
"#;

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<UserRecord>, i64)> {
        let users = sqlx::query_as::<_, UserRecord>(&format!(
            "{USER_SELECT} {USER_FILTER} ORDER BY u.last_name, u.first_name, u.id LIMIT $3 OFFSET $4"
        ))
        .bind(filter.role)
        .bind(filter.include_archived)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM users u JOIN auths a ON a.id = u.id {USER_FILTER}"
        ))
        .bind(filter.role)
        .bind(filter.include_archived)
        .fetch_one(&self.pool)
        .await?;

        Ok((users, total))
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!("{USER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<UserRecord>> {
        info!("Updating user profile {}", id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                birthdate = COALESCE($4, birthdate),
                ssn = COALESCE($5, ssn),
                email = COALESCE($6, email),
                phone = COALESCE($7, phone),
                photo_url = COALESCE($8, photo_url),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(changes.birthdate)
        .bind(&changes.encrypted_ssn)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(&changes.photo_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find(id).await
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting user {}", id);

        let result = sqlx::query("DELETE FROM auths WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
