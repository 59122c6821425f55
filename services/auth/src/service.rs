//! Account operations behind the `/auth` endpoints

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    access::{AccountStatus, CurrentUser, Role},
    auth::{Auth, AuthRepository, AuthView, NewAuth, StoredToken},
    error::DatabaseError,
    middleware::inactive_account_message,
    response::{ApiError, ApiResult, messages},
    token::TokenService,
};

use crate::{
    password::{hash_password, verify_password},
    rate_limiter::LoginThrottle,
    validation::{normalize_username, validate_password, validate_username},
};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Target of an account status change
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub id: Uuid,
    pub role: Role,
}

/// `id` defaults to the caller
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub id: Option<Uuid>,
    pub current_password: Option<String>,
    pub new_password: String,
}

/// Returned by login and token renewal
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expiration: i64,
}

/// Status transitions reachable through `/auth/*/account`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Activate,
    Inactivate,
    Archive,
    Delete,
}

impl StatusChange {
    fn target_status(self) -> AccountStatus {
        match self {
            StatusChange::Activate => AccountStatus::Active,
            StatusChange::Inactivate => AccountStatus::Inactive,
            StatusChange::Archive => AccountStatus::Archived,
            StatusChange::Delete => AccountStatus::SoftDeleted,
        }
    }

    /// Activation and archival are supervisory; the owner may inactivate or delete
    fn is_permitted(self, actor: &CurrentUser, target: &Auth) -> bool {
        match self {
            StatusChange::Activate | StatusChange::Archive => {
                actor.has_role(Role::Manager) && actor.can_manage(target.id, target.role)
            }
            StatusChange::Inactivate | StatusChange::Delete => {
                actor.can_modify(target.id, target.role)
            }
        }
    }
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AuthRepository>,
    tokens: TokenService,
    throttle: LoginThrottle,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AuthRepository>, tokens: TokenService, throttle: LoginThrottle) -> Self {
        Self {
            accounts,
            tokens,
            throttle,
        }
    }

    /// Create a not-yet-verified caregiver account
    pub async fn register(&self, credentials: &Credentials) -> ApiResult<AuthView> {
        validate_username(&credentials.username).map_err(ApiError::BadRequest)?;
        validate_password(&credentials.password).map_err(ApiError::BadRequest)?;

        let new_auth = NewAuth {
            username: normalize_username(&credentials.username),
            password_hash: hash_password(&credentials.password)?,
            role: Role::Caregiver,
            status: AccountStatus::NotVerified,
        };

        let auth = self.accounts.register(&new_auth).await.map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => {
                ApiError::Conflict("Username is already registered".to_string())
            }
            other => other.into(),
        })?;

        info!("Registered account {} ({})", auth.id, auth.username);
        Ok(AuthView::from(&auth))
    }

    pub async fn login(&self, credentials: &Credentials) -> ApiResult<SessionView> {
        let username = normalize_username(&credentials.username);
        let Some(attempt) = self.throttle.begin(&username) else {
            return Err(ApiError::TooManyRequests);
        };

        let account = self.accounts.find_by_username(&username).await?;
        let verified = match &account {
            Some(auth) => verify_password(&credentials.password, &auth.password_hash)?,
            None => false,
        };

        let auth = match account {
            Some(auth) if verified => auth,
            _ => {
                attempt.failed();
                warn!("Failed login for {}", username);
                return Err(ApiError::Unauthorized(messages::INVALID_CREDENTIALS.to_string()));
            }
        };

        attempt.succeeded();

        if let Some(message) = inactive_account_message(auth.status) {
            return Err(ApiError::Unauthorized(message.to_string()));
        }

        let session = self.start_session(&auth).await?;
        info!("Account {} logged in", auth.id);
        Ok(session)
    }

    /// Replace the caller's token with a fresh one
    pub async fn renew(&self, actor: &CurrentUser) -> ApiResult<SessionView> {
        let auth = self.load(actor.id).await?;
        self.start_session(&auth).await
    }

    pub async fn logout(&self, actor: &CurrentUser) -> ApiResult<()> {
        self.accounts.store_token(actor.id, None).await?;
        info!("Account {} logged out", actor.id);
        Ok(())
    }

    pub async fn me(&self, actor: &CurrentUser) -> ApiResult<AuthView> {
        let auth = self.load(actor.id).await?;
        Ok(AuthView::from(&auth))
    }

    pub async fn change_status(
        &self,
        actor: &CurrentUser,
        id: Uuid,
        change: StatusChange,
    ) -> ApiResult<AuthView> {
        let target = self.load(id).await?;
        if !change.is_permitted(actor, &target) {
            return Err(ApiError::forbidden());
        }

        let status = change.target_status();
        let revoke = !status.can_authenticate();
        let auth = self
            .accounts
            .update_status(id, status, revoke)
            .await?
            .ok_or_else(|| ApiError::not_found("Account"))?;

        info!("{} set account {} to {}", actor.username, id, status);
        Ok(AuthView::from(&auth))
    }

    pub async fn change_role(&self, actor: &CurrentUser, request: &ChangeRoleRequest) -> ApiResult<AuthView> {
        if actor.role != Role::Administrator || actor.is_self(request.id) {
            return Err(ApiError::forbidden());
        }

        let auth = self
            .accounts
            .update_role(request.id, request.role)
            .await?
            .ok_or_else(|| ApiError::not_found("Account"))?;

        info!("{} changed role of {} to {}", actor.username, auth.id, auth.role);
        Ok(AuthView::from(&auth))
    }

    pub async fn change_password(
        &self,
        actor: &CurrentUser,
        request: &ChangePasswordRequest,
    ) -> ApiResult<()> {
        let target_id = request.id.unwrap_or(actor.id);
        let target = self.load(target_id).await?;

        if actor.is_self(target_id) {
            let current = request
                .current_password
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest("Current password is required".to_string()))?;
            if !verify_password(current, &target.password_hash)? {
                return Err(ApiError::Unauthorized(
                    "Current password is incorrect".to_string(),
                ));
            }
        } else if actor.role != Role::Administrator {
            return Err(ApiError::forbidden());
        }

        validate_password(&request.new_password).map_err(ApiError::BadRequest)?;
        let hash = hash_password(&request.new_password)?;
        self.accounts.update_password(target_id, &hash).await?;

        if !actor.is_self(target_id) {
            // A reset ends the target's session
            self.accounts.store_token(target_id, None).await?;
        }

        info!("{} changed password of {}", actor.username, target_id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ApiResult<Auth> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Account"))
    }

    async fn start_session(&self, auth: &Auth) -> ApiResult<SessionView> {
        let issued = self
            .tokens
            .issue(auth.id, &auth.username, auth.role)
            .map_err(|e| ApiError::Internal(e.into()))?;

        let stored = StoredToken {
            token: issued.token.clone(),
            expiration: issued.expiration,
        };
        if !self.accounts.store_token(auth.id, Some(&stored)).await? {
            return Err(ApiError::not_found("Account"));
        }

        Ok(SessionView {
            id: auth.id,
            username: auth.username.clone(),
            role: auth.role,
            token: issued.token,
            expiration: issued.expiration,
        })
    }
}
