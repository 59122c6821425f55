//! `/patients` handlers

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
    handlers::ensure_patient_visible,
    models::patient::{NewPatient, Patient, PatientFilter, PatientQuery, PatientStatus, UpdatePatient},
    state::AppState,
};

pub async fn create_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let patient = state.patients.create(&payload).await?;
    info!("{} created patient {}", user.username, patient.id);
    Ok(ApiResponse::created(patient))
}

pub async fn list_patients(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
    WithRejection(Query(query), _): QueryParams<PatientQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = if user.has_role(Role::Manager) {
        PatientFilter {
            include_archived: query.include_archived,
            ids: None,
        }
    } else {
        PatientFilter {
            include_archived: false,
            ids: Some(state.assignments.assigned_patients(user.id).await?),
        }
    };

    let (patients, total) = state.patients.list(&filter, &page).await?;
    Ok(ApiResponse::ok(Page::new(patients, &page, total)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let patient = state
        .patients
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    ensure_patient_visible(&state, &user, patient.id).await?;

    if !user.has_role(Role::Manager) && !patient.status.is_listed() {
        return Err(ApiError::not_found("Patient"));
    }

    Ok(ApiResponse::ok(patient))
}

pub async fn update_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(payload), _): JsonBody<UpdatePatient>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Manager)?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let patient = state
        .patients
        .update(id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;

    Ok(ApiResponse::ok(patient))
}

async fn set_status(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    status: PatientStatus,
) -> ApiResult<ApiResponse<Patient>> {
    require_role(user, Role::Manager)?;

    let patient = state
        .patients
        .set_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;

    info!("{} set patient {} to {}", user.username, id, status);
    Ok(ApiResponse::ok(patient))
}

pub async fn activate_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, PatientStatus::Active).await
}

pub async fn archive_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, PatientStatus::Archived).await
}

pub async fn soft_delete_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_status(&state, &user, id, PatientStatus::Deleted).await
}

pub async fn delete_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_role(&user, Role::Administrator)?;

    if !state.patients.delete(id).await? {
        return Err(ApiError::not_found("Patient"));
    }

    info!("{} deleted patient {}", user.username, id);
    Ok(ApiResponse::message("Patient deleted"))
}
