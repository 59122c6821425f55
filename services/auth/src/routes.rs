//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use common::{
    access::CurrentUser,
    auth::AuthView,
    middleware::auth_middleware,
    response::{ApiResponse, ApiResult, JsonBody, WithRejection},
};

use crate::{
    service::{AccountRequest, ChangePasswordRequest, ChangeRoleRequest, Credentials, StatusChange},
    state::AppState,
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/activate/account", put(activate_account))
        .route("/auth/inactivate/account", put(inactivate_account))
        .route("/auth/archive/account", put(archive_account))
        .route("/auth/delete/account", put(delete_account))
        .route("/auth/renew/token", put(renew_token))
        .route("/auth/change/role", put(change_role))
        .route("/auth/change/password", put(change_password))
        .route("/auth/logout", put(logout))
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    ApiResponse::ok(json!({ "service": "auth" }))
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): JsonBody<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let account = state.accounts.register(&payload).await?;
    Ok(ApiResponse::created(account).with_message("Account registered"))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): JsonBody<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let session = state.accounts.login(&payload).await?;
    Ok(ApiResponse::ok(session))
}

async fn change_status(
    state: &AppState,
    user: &CurrentUser,
    request: &AccountRequest,
    change: StatusChange,
) -> ApiResult<ApiResponse<AuthView>> {
    let account = state.accounts.change_status(user, request.id, change).await?;
    Ok(ApiResponse::ok(account))
}

pub async fn activate_account(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<AccountRequest>,
) -> ApiResult<impl IntoResponse> {
    change_status(&state, &user, &payload, StatusChange::Activate).await
}

pub async fn inactivate_account(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<AccountRequest>,
) -> ApiResult<impl IntoResponse> {
    change_status(&state, &user, &payload, StatusChange::Inactivate).await
}

pub async fn archive_account(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<AccountRequest>,
) -> ApiResult<impl IntoResponse> {
    change_status(&state, &user, &payload, StatusChange::Archive).await
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<AccountRequest>,
) -> ApiResult<impl IntoResponse> {
    change_status(&state, &user, &payload, StatusChange::Delete).await
}

pub async fn renew_token(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let session = state.accounts.renew(&user).await?;
    Ok(ApiResponse::ok(session))
}

pub async fn change_role(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<ChangeRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let account = state.accounts.change_role(&user, &payload).await?;
    Ok(ApiResponse::ok(account).with_message("Role changed"))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    state.accounts.change_password(&user, &payload).await?;
    Ok(ApiResponse::message("Password changed"))
}

pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    state.accounts.logout(&user).await?;
    Ok(ApiResponse::message("Logged out"))
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    let account = state.accounts.me(&user).await?;
    Ok(ApiResponse::ok(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use chrono::Utc;
    use common::{
        access::{AccountStatus, Role},
        auth::{Auth, memory::InMemoryAuthRepository},
        middleware::Authenticator,
        token::TokenService,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        password::hash_password,
        rate_limiter::{LoginThrottle, ThrottleConfig},
        service::AccountService,
    };

    const PASSWORD: &str = "Str0ng!pass";

    fn app(repo: Arc<InMemoryAuthRepository>) -> Router {
        let tokens = TokenService::plain();
        let state = AppState {
            authenticator: Authenticator::new(tokens.clone(), repo.clone()),
            accounts: AccountService::new(repo, tokens, LoginThrottle::new(ThrottleConfig::default())),
        };
        create_router(state)
    }

    fn seed(repo: &InMemoryAuthRepository, username: &str, role: Role) -> Uuid {
        let auth = Auth {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            token: None,
            expiration: None,
            role,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let id = auth.id;
        repo.insert(auth);
        id
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn login(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_then_login_is_blocked_until_activated() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let app = app(repo.clone());
        seed(&repo, "boss@example.com", Role::Manager);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/auth/register",
                None,
                json!({ "username": "jane@example.com", "password": PASSWORD }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["status"], -1);
        assert_eq!(body["data"]["role"], 2);
        let jane = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "username": "jane@example.com", "password": PASSWORD }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Account has not been verified");

        let boss = login(&app, "boss@example.com").await;
        let (status, body) = send(
            &app,
            json_request("PUT", "/auth/activate/account", Some(&boss), json!({ "id": jane })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], 1);

        login(&app, "jane@example.com").await;
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let app = app(repo.clone());
        seed(&repo, "jane@example.com", Role::Caregiver);
        let token = login(&app, "jane@example.com").await;

        let (status, body) = send(&app, empty_request("GET", "/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "jane@example.com");

        let (status, _) = send(&app, empty_request("PUT", "/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, empty_request("GET", "/auth/me", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authorization token is no longer valid");
    }

    #[tokio::test]
    async fn renewed_token_replaces_the_old_one() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let app = app(repo.clone());
        seed(&repo, "jane@example.com", Role::Caregiver);
        let old = login(&app, "jane@example.com").await;

        // The expiration moves by at least a millisecond
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (status, body) = send(&app, empty_request("PUT", "/auth/renew/token", &old)).await;
        assert_eq!(status, StatusCode::OK);
        let new = body["data"]["token"].as_str().unwrap().to_string();
        assert_ne!(new, old);

        let (status, _) = send(&app, empty_request("GET", "/auth/me", &old)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, empty_request("GET", "/auth/me", &new)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = app(Arc::new(InMemoryAuthRepository::new()));
        let request = Request::builder()
            .method("GET")
            .uri("/auth/me")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authorization token is missing");

        // A bare scheme carries no token
        let (status, body) = send(&app, empty_request("GET", "/auth/me", "Bearer ")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authorization token is missing");
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_unsupported() {
        let app = app(Arc::new(InMemoryAuthRepository::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .body(Body::from(r#"{"username":"a@b.co","password":"x"}"#))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["code"], 415);
    }

    #[tokio::test]
    async fn role_change_is_reserved_to_administrators() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let app = app(repo.clone());
        seed(&repo, "admin@example.com", Role::Administrator);
        seed(&repo, "boss@example.com", Role::Manager);
        let jane = seed(&repo, "jane@example.com", Role::Caregiver);

        let boss = login(&app, "boss@example.com").await;
        let (status, _) = send(
            &app,
            json_request(
                "PUT",
                "/auth/change/role",
                Some(&boss),
                json!({ "id": jane, "role": 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = login(&app, "admin@example.com").await;
        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                "/auth/change/role",
                Some(&admin),
                json!({ "id": jane, "role": 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], 1);
    }
}
