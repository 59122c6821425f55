//! Account entity and repository
//!
//! An `Auth` row holds credentials, role, status and the current session
//! token of an account. Each account has exactly one profile row in `users`
//! sharing the same primary key; both are created together at registration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::{
    access::{AccountStatus, Role},
    error::DatabaseResult,
};

/// Placeholder used for profile names until the user fills them in
pub const PLACEHOLDER_NAME: &str = "TBD";

/// Account entity
#[derive(Debug, Clone, FromRow)]
pub struct Auth {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub token: Option<String>,
    pub expiration: Option<i64>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auth {
    /// Whether `token` is the session currently stored for this account
    pub fn holds_token(&self, token: &str) -> bool {
        self.token.as_deref() == Some(token)
    }
}

/// Public view of an account
#[derive(Debug, Clone, Serialize)]
pub struct AuthView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
}

impl From<&Auth> for AuthView {
    fn from(auth: &Auth) -> Self {
        Self {
            id: auth.id,
            username: auth.username.clone(),
            role: auth.role,
            status: auth.status,
        }
    }
}

/// New account creation payload
#[derive(Debug, Clone)]
pub struct NewAuth {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
}

/// Token and expiration travel together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub token: String,
    pub expiration: i64,
}

/// Data access for accounts
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// Create the account and its placeholder profile atomically
    async fn register(&self, new_auth: &NewAuth) -> DatabaseResult<Auth>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Auth>>;

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Auth>>;

    /// Store or clear (`None`) the session token; `false` when no such account
    async fn store_token(&self, id: Uuid, token: Option<&StoredToken>) -> DatabaseResult<bool>;

    /// Change the status, clearing the token when `revoke_token` is set
    async fn update_status(
        &self,
        id: Uuid,
        status: AccountStatus,
        revoke_token: bool,
    ) -> DatabaseResult<Option<Auth>>;

    /// Change the role and revoke the current token
    async fn update_role(&self, id: Uuid, role: Role) -> DatabaseResult<Option<Auth>>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool>;
}

const AUTH_COLUMNS: &str =
    "id, username, password_hash, token, expiration, role, status, created_at, updated_at";

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthRepository for PgAuthRepository {
    async fn register(&self, new_auth: &NewAuth) -> DatabaseResult<Auth> {
        info!("Registering account: {}", new_auth.username);

        let mut tx = self.pool.begin().await?;

        let auth = sqlx::query_as::<_, Auth>(&format!(
            r#"
            INSERT INTO auths (id, username, password_hash, role, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {AUTH_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_auth.username)
        .bind(&new_auth.password_hash)
        .bind(new_auth.role)
        .bind(new_auth.status)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email)
            VALUES ($1, $2, $2, $3)
            "#,
        )
        .bind(auth.id)
        .bind(PLACEHOLDER_NAME)
        .bind(&auth.username)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(auth)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Auth>> {
        let auth = sqlx::query_as::<_, Auth>(&format!(
            "SELECT {AUTH_COLUMNS} FROM auths WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(auth)
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Auth>> {
        let auth = sqlx::query_as::<_, Auth>(&format!(
            "SELECT {AUTH_COLUMNS} FROM auths WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(auth)
    }

    async fn store_token(&self, id: Uuid, token: Option<&StoredToken>) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auths
            SET token = $2, expiration = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token.map(|t| t.token.as_str()))
        .bind(token.map(|t| t.expiration))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AccountStatus,
        revoke_token: bool,
    ) -> DatabaseResult<Option<Auth>> {
        info!("Setting account {} status to {}", id, status);

        let auth = sqlx::query_as::<_, Auth>(&format!(
            r#"
            UPDATE auths
            SET status = $2,
                token = CASE WHEN $3 THEN NULL ELSE token END,
                expiration = CASE WHEN $3 THEN NULL ELSE expiration END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {AUTH_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(revoke_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(auth)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> DatabaseResult<Option<Auth>> {
        info!("Setting account {} role to {}", id, role);

        let auth = sqlx::query_as::<_, Auth>(&format!(
            r#"
            UPDATE auths
            SET role = $2, token = NULL, expiration = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {AUTH_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(auth)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE auths SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory account repository for tests
#[cfg(any(test, feature = "testing"))]
pub mod memory {
    use super::*;
    use crate::error::DatabaseError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryAuthRepository {
        accounts: Mutex<HashMap<Uuid, Auth>>,
    }

    impl InMemoryAuthRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed an account directly, bypassing registration
        pub fn insert(&self, auth: Auth) {
            self.accounts.lock().unwrap().insert(auth.id, auth);
        }

        pub fn get(&self, id: Uuid) -> Option<Auth> {
            self.accounts.lock().unwrap().get(&id).cloned()
        }

        fn modify<F>(&self, id: Uuid, change: F) -> Option<Auth>
        where
            F: FnOnce(&mut Auth),
        {
            let mut accounts = self.accounts.lock().unwrap();
            let auth = accounts.get_mut(&id)?;
            change(auth);
            auth.updated_at = Utc::now();
            Some(auth.clone())
        }
    }

    #[async_trait]
    impl AuthRepository for InMemoryAuthRepository {
        async fn register(&self, new_auth: &NewAuth) -> DatabaseResult<Auth> {
            let mut accounts = self.accounts.lock().unwrap();
            let taken = accounts
                .values()
                .any(|a| a.username.eq_ignore_ascii_case(&new_auth.username));
            if taken {
                return Err(DatabaseError::UniqueViolation(
                    "auths_username_key".to_string(),
                ));
            }

            let now = Utc::now();
            let auth = Auth {
                id: Uuid::new_v4(),
                username: new_auth.username.clone(),
                password_hash: new_auth.password_hash.clone(),
                token: None,
                expiration: None,
                role: new_auth.role,
                status: new_auth.status,
                created_at: now,
                updated_at: now,
            };
            accounts.insert(auth.id, auth.clone());
            Ok(auth)
        }

        async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Auth>> {
            Ok(self.get(id))
        }

        async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Auth>> {
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .values()
                .find(|a| a.username.eq_ignore_ascii_case(username))
                .cloned())
        }

        async fn store_token(
            &self,
            id: Uuid,
            token: Option<&StoredToken>,
        ) -> DatabaseResult<bool> {
            let updated = self.modify(id, |auth| {
                auth.token = token.map(|t| t.token.clone());
                auth.expiration = token.map(|t| t.expiration);
            });
            Ok(updated.is_some())
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: AccountStatus,
            revoke_token: bool,
        ) -> DatabaseResult<Option<Auth>> {
            Ok(self.modify(id, |auth| {
                auth.status = status;
                if revoke_token {
                    auth.token = None;
                    auth.expiration = None;
                }
            }))
        }

        async fn update_role(&self, id: Uuid, role: Role) -> DatabaseResult<Option<Auth>> {
            Ok(self.modify(id, |auth| {
                auth.role = role;
                auth.token = None;
                auth.expiration = None;
            }))
        }

        async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
            let updated = self.modify(id, |auth| auth.password_hash = password_hash.to_string());
            Ok(updated.is_some())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryAuthRepository;
    use crate::error::DatabaseError;
    use super::*;

    fn new_auth(username: &str) -> NewAuth {
        NewAuth {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Caregiver,
            status: AccountStatus::NotVerified,
        }
    }

    #[tokio::test]
    async fn usernames_are_unique_case_insensitively() {
        let repo = InMemoryAuthRepository::new();
        repo.register(&new_auth("nurse@example.com")).await.unwrap();

        let err = repo
            .register(&new_auth("Nurse@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn token_and_expiration_are_cleared_together() {
        let repo = InMemoryAuthRepository::new();
        let auth = repo.register(&new_auth("nurse@example.com")).await.unwrap();

        let stored = StoredToken {
            token: "abc".to_string(),
            expiration: 42,
        };
        assert!(repo.store_token(auth.id, Some(&stored)).await.unwrap());
        let auth = repo.find_by_id(auth.id).await.unwrap().unwrap();
        assert!(auth.holds_token("abc"));
        assert_eq!(auth.expiration, Some(42));

        let auth = repo
            .update_status(auth.id, AccountStatus::Inactive, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(auth.token, None);
        assert_eq!(auth.expiration, None);
    }

    #[tokio::test]
    async fn store_token_reports_missing_account() {
        let repo = InMemoryAuthRepository::new();
        assert!(!repo.store_token(Uuid::new_v4(), None).await.unwrap());
    }
}
