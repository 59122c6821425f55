//! Request authentication and the HTTP layers shared by both services

use axum::{
    Router,
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, HeaderValue, Method, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::{
    access::{AccountStatus, CurrentUser, Role},
    auth::AuthRepository,
    response::{ApiError, messages, panic_response},
    settings::Settings,
    token::TokenService,
};

/// Resolves a presented token into the current user
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
    accounts: Arc<dyn AuthRepository>,
}

impl Authenticator {
    pub fn new(tokens: TokenService, accounts: Arc<dyn AuthRepository>) -> Self {
        Self { tokens, accounts }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Decode, check expiry, and match the token against the persisted session
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, ApiError> {
        let claims = self.tokens.decode_token(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::Unauthorized(messages::TOKEN_INVALID.to_string())
        })?;

        if claims.is_expired() {
            return Err(ApiError::Unauthorized(messages::TOKEN_EXPIRED.to_string()));
        }

        let auth = self
            .accounts
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(messages::TOKEN_INVALID.to_string()))?;

        if !auth.holds_token(token) {
            warn!("Token for account {} does not match the stored session", auth.id);
            return Err(ApiError::Unauthorized(messages::TOKEN_REVOKED.to_string()));
        }

        if let Some(message) = inactive_account_message(auth.status) {
            return Err(ApiError::Unauthorized(message.to_string()));
        }

        Ok(CurrentUser {
            id: auth.id,
            username: auth.username,
            role: auth.role,
        })
    }
}

/// Why an account with this status may not authenticate
pub fn inactive_account_message(status: AccountStatus) -> Option<&'static str> {
    match status {
        AccountStatus::Active => None,
        AccountStatus::NotVerified => Some(messages::ACCOUNT_NOT_VERIFIED),
        AccountStatus::Inactive => Some(messages::ACCOUNT_INACTIVE),
        AccountStatus::Archived | AccountStatus::SoftDeleted => {
            Some(messages::ACCOUNT_UNAVAILABLE)
        }
    }
}

/// Forbid callers ranked below `minimum`
pub fn require_role(user: &CurrentUser, minimum: Role) -> Result<(), ApiError> {
    if user.has_role(minimum) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// Token from the `Authorization` header, with or without a `Bearer ` prefix
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.strip_prefix("Bearer") {
        // A bare scheme carries no token
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(authenticator): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized(messages::TOKEN_MISSING.to_string()))?
        .to_string();

    let user = authenticator.authenticate(&token).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized(messages::TOKEN_MISSING.to_string()))
    }
}

/// CORS policy from the configured origins
pub fn cors_layer(settings: &Settings) -> CorsLayer {
    let origin = match settings.allowed_origins() {
        None => AllowOrigin::any(),
        Some(origins) => {
            let values: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin {}", origin);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Panic catching, request tracing and CORS, outermost last
pub fn with_http_layers(router: Router, settings: &Settings) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{Auth, StoredToken, memory::InMemoryAuthRepository},
        token::now_millis,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn account(status: AccountStatus) -> Auth {
        Auth {
            id: Uuid::new_v4(),
            username: "nurse@example.com".to_string(),
            password_hash: "hash".to_string(),
            token: None,
            expiration: None,
            role: Role::Caregiver,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn setup(status: AccountStatus) -> (Authenticator, Arc<InMemoryAuthRepository>, String) {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let tokens = TokenService::plain();
        let auth = account(status);
        repo.insert(auth.clone());

        let issued = tokens.issue(auth.id, &auth.username, auth.role).unwrap();
        let stored = StoredToken {
            token: issued.token.clone(),
            expiration: issued.expiration,
        };
        repo.store_token(auth.id, Some(&stored)).await.unwrap();

        (Authenticator::new(tokens, repo.clone()), repo, issued.token)
    }

    #[test]
    fn extract_token_accepts_bearer_and_raw() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   abc "));
        assert_eq!(extract_token(&headers), Some("abc"));

        // Only the scheme word is stripped, not a prefix of a raw token
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearerabc"));
        assert_eq!(extract_token(&headers), Some("Bearerabc"));
    }

    #[test]
    fn require_role_checks_rank() {
        let manager = CurrentUser {
            id: Uuid::new_v4(),
            username: "boss@example.com".to_string(),
            role: Role::Manager,
        };
        assert!(require_role(&manager, Role::Caregiver).is_ok());
        assert!(require_role(&manager, Role::Manager).is_ok());
        assert!(matches!(
            require_role(&manager, Role::Administrator),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn stored_token_authenticates() {
        let (authenticator, _, token) = setup(AccountStatus::Active).await;
        let user = authenticator.authenticate(&token).await.unwrap();
        assert_eq!(user.role, Role::Caregiver);
    }

    #[tokio::test]
    async fn forged_token_is_rejected_by_session_check() {
        let (authenticator, repo, _) = setup(AccountStatus::Active).await;
        let victim = account(AccountStatus::Active);
        repo.insert(victim.clone());

        let forged = authenticator
            .tokens()
            .create_token(victim.id, &victim.username, Role::Administrator, now_millis() + 60_000)
            .unwrap();

        let err = authenticator.authenticate(&forged).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(m) if m == messages::TOKEN_REVOKED));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (authenticator, repo, _) = setup(AccountStatus::Active).await;
        let auth = account(AccountStatus::Active);
        repo.insert(auth.clone());

        let expired = authenticator
            .tokens()
            .create_token(auth.id, &auth.username, auth.role, now_millis() - 1)
            .unwrap();
        let stored = StoredToken {
            token: expired.clone(),
            expiration: now_millis() - 1,
        };
        repo.store_token(auth.id, Some(&stored)).await.unwrap();

        let err = authenticator.authenticate(&expired).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(m) if m == messages::TOKEN_EXPIRED));
    }

    #[tokio::test]
    async fn inactive_account_is_rejected() {
        let (authenticator, _, token) = setup(AccountStatus::Inactive).await;
        let err = authenticator.authenticate(&token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(m) if m == messages::ACCOUNT_INACTIVE));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (authenticator, _, _) = setup(AccountStatus::Active).await;
        let err = authenticator.authenticate("%%%").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(m) if m == messages::TOKEN_INVALID));
    }
}
