//! `/visits` handlers and progress transitions

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    access::{CurrentUser, Role},
    middleware::require_role,
    pagination::{Page, PageRequest},
    response::{ApiError, ApiResponse, ApiResult, JsonBody, PathParams, QueryParams, WithRejection},
};

use crate::{
    models::visit::{
        NewVisit, Progress, UpdateVisit, Visit, VisitAction, VisitFilter, VisitStatus,
        validate_times,
    },
    state::AppState,
};

async fn load(state: &AppState, id: Uuid) -> ApiResult<Visit> {
    state
        .visits
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit"))
}

/// Caregivers only ever see the visits assigned to them
fn ensure_visible(user: &CurrentUser, visit: &Visit) -> ApiResult<()> {
    if user.has_role(Role::Manager) || user.is_self(visit.user_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// Whether `user` may perform `action` on `visit`
fn may_perform(user: &CurrentUser, visit: &Visit, action: VisitAction) -> bool {
    if user.has_role(Role::Manager) {
        return true;
    }

    let own = user.is_self(visit.user_id);
    match action {
        VisitAction::CheckIn | VisitAction::CheckOut => own,
        VisitAction::Cancel => own && visit.progress == Progress::Scheduled,
        VisitAction::Approve => false,
    }
}

pub async fn create_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;
    validate_times(payload.start_time, payload.end_time).map_err(ApiError::BadRequest)?;

    let visit = state.visits.create(&payload, user.id).await?;
    info!(
        "{} scheduled visit {} for caregiver {} with patient {}",
        user.username, visit.id, visit.user_id, visit.patient_id
    );
    Ok(ApiResponse::created(visit))
}

pub async fn list_visits(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
    WithRejection(Query(mut filter), _): QueryParams<VisitFilter>,
) -> ApiResult<impl IntoResponse> {
    if !user.has_role(Role::Manager) {
        filter.user_id = Some(user.id);
    }

    let (visits, total) = state.visits.list(&filter, &page).await?;
    Ok(ApiResponse::ok(Page::new(visits, &page, total)))
}

pub async fn get_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let visit = load(&state, id).await?;
    ensure_visible(&user, &visit)?;
    Ok(ApiResponse::ok(visit))
}

pub async fn update_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(payload), _): JsonBody<UpdateVisit>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;

    let visit = load(&state, id).await?;
    if visit.progress != Progress::Scheduled {
        return Err(ApiError::Conflict(
            "Only scheduled visits can be edited".to_string(),
        ));
    }

    let merged = visit.merged(&payload);
    validate_times(merged.start_time, merged.end_time).map_err(ApiError::BadRequest)?;

    let visit = state
        .visits
        .update(&merged)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit"))?;

    info!("{} updated visit {}", user.username, id);
    Ok(ApiResponse::ok(visit))
}

async fn set_status(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    status: VisitStatus,
) -> ApiResult<ApiResponse<Visit>> {
    require_role(user, Role::Manager)?;

    let visit = state
        .visits
        .set_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit"))?;

    info!("{} set visit {} status to {:?}", user.username, id, status);
    Ok(ApiResponse::ok(visit))
}

pub async fn activate_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, VisitStatus::Active).await
}

pub async fn archive_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, VisitStatus::Archived).await
}

pub async fn soft_delete_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, VisitStatus::SoftDeleted).await
}

pub async fn delete_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Administrator)?;

    if !state.visits.delete(id).await? {
        return Err(ApiError::not_found("Visit"));
    }

    info!("{} deleted visit {}", user.username, id);
    Ok(ApiResponse::message("Visit deleted"))
}

/// Validate and apply one progress transition
async fn transition(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    action: VisitAction,
) -> ApiResult<Visit> {
    let visit = load(state, id).await?;
    ensure_visible(user, &visit)?;

    if !may_perform(user, &visit, action) {
        return Err(ApiError::forbidden());
    }
    if visit.status != VisitStatus::Active {
        return Err(ApiError::Conflict("Visit is not active".to_string()));
    }

    let next = visit
        .progress
        .apply(action)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    match state
        .visits
        .transition(id, visit.progress, next, action, user.id)
        .await?
    {
        Some(updated) => {
            info!(
                "{} moved visit {} from {} to {}",
                user.username, id, visit.progress, next
            );
            Ok(updated)
        }
        None => {
            warn!("Visit {} changed before {} could be applied", id, action);
            Err(ApiError::Conflict(
                "Visit was modified concurrently, reload and retry".to_string(),
            ))
        }
    }
}

pub async fn checkin_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let visit = transition(&state, &user, id, VisitAction::CheckIn).await?;
    Ok(ApiResponse::ok(visit))
}

pub async fn checkout_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let visit = transition(&state, &user, id, VisitAction::CheckOut).await?;
    Ok(ApiResponse::ok(visit))
}

pub async fn approve_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let visit = transition(&state, &user, id, VisitAction::Approve).await?;
    Ok(ApiResponse::ok(visit))
}

pub async fn cancel_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let visit = transition(&state, &user, id, VisitAction::Cancel).await?;
    Ok(ApiResponse::ok(visit))
}
