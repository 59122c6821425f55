//! `/assignments` handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use common::{
    access::{CurrentUser, Role},
    middleware::require_role,
    pagination::{Page, PageRequest},
    response::{ApiError, ApiResponse, ApiResult, JsonBody, PathParams, QueryParams, WithRejection},
};

use crate::{
    models::assignment::{Assignment, AssignmentFilter, AssignmentStatus, NewAssignment, UpdateAssignment},
    state::AppState,
};

pub async fn create_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<NewAssignment>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;

    let assignment = state.assignments.create(&payload, user.id).await?;
    info!(
        "{} assigned caregiver {} to patient {}",
        user.username, assignment.user_id, assignment.patient_id
    );
    Ok(ApiResponse::created(assignment))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
    WithRejection(Query(mut filter), _): QueryParams<AssignmentFilter>,
) -> ApiResult<impl IntoResponse> {
    if !user.has_role(Role::Manager) {
        filter.user_id = Some(user.id);
    }

    let (assignments, total) = state.assignments.list(&filter, &page).await?;
    Ok(ApiResponse::ok(Page::new(assignments, &page, total)))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(payload), _): JsonBody<UpdateAssignment>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;

    let assignment = state
        .assignments
        .update_notes(id, payload.notes.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment"))?;

    Ok(ApiResponse::ok(assignment))
}

async fn set_status(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    status: AssignmentStatus,
) -> ApiResult<ApiResponse<Assignment>> {
    require_role(user, Role::Manager)?;

    let assignment = state
        .assignments
        .set_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment"))?;

    info!("{} set assignment {} to {:?}", user.username, id, status);
    Ok(ApiResponse::ok(assignment))
}

pub async fn activate_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, AssignmentStatus::Active).await
}

pub async fn inactivate_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, AssignmentStatus::Inactive).await
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;

    if !state.assignments.delete(id).await? {
        return Err(ApiError::not_found("Assignment"));
    }

    info!("{} deleted assignment {}", user.username, id);
    Ok(ApiResponse::message("Assignment deleted"))
}
