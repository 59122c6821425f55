//! `/users` handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use common::{
    access::{CurrentUser, Role},
    middleware::require_role,
    pagination::{Page, PageRequest},
    response::{ApiError, ApiResponse, ApiResult, JsonBody, PathParams, QueryParams, WithRejection},
};

use crate::{
    models::user::{UpdateUser, UserChanges, UserFilter, UserView, normalize_ssn},
    state::AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
    WithRejection(Query(filter), _): QueryParams<UserFilter>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;

    let (records, total) = state.users.list(&filter, &page).await?;
    let views: Vec<UserView> = records
        .into_iter()
        .map(|record| UserView::new(record, state.cipher.as_ref()))
        .collect();

    Ok(ApiResponse::ok(Page::new(views, &page, total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !user.is_self(id) {
        require_role(&user, Role::Manager)?;
    }

    let record = state
        .users
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(ApiResponse::ok(UserView::new(record, state.cipher.as_ref())))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(payload), _): JsonBody<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    let target = state
        .users
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !user.can_modify(target.id, target.role) {
        return Err(ApiError::forbidden());
    }

    payload
        .validate(Utc::now().date_naive())
        .map_err(ApiError::BadRequest)?;

    let encrypted_ssn = match &payload.ssn {
        None => None,
        Some(ssn) => {
            let cipher = state.cipher.as_ref().ok_or_else(|| {
                ApiError::ServiceUnavailable("SSN storage is not configured".to_string())
            })?;
            let normalized = normalize_ssn(ssn).map_err(ApiError::BadRequest)?;
            Some(
                cipher
                    .encrypt(&normalized)
                    .map_err(|e| ApiError::Internal(e.into()))?,
            )
        }
    };

    let changes = UserChanges {
        first_name: payload.first_name.map(|name| name.trim().to_string()),
        last_name: payload.last_name.map(|name| name.trim().to_string()),
        birthdate: payload.birthdate,
        encrypted_ssn,
        email: payload.email,
        phone: payload.phone,
        photo_url: payload.photo_url,
    };

    let record = state
        .users
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!("{} updated profile {}", user.username, id);
    Ok(ApiResponse::ok(UserView::new(record, state.cipher.as_ref())))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if user.role != Role::Administrator || user.is_self(id) {
        return Err(ApiError::forbidden());
    }

    if !state.users.delete(id).await? {
        return Err(ApiError::not_found("User"));
    }

    info!("{} deleted user {}", user.username, id);
    Ok(ApiResponse::message("User deleted"))
}
