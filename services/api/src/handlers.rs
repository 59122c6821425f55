//! Request handlers, one module per resource

pub mod addresses;
pub mod assignments;
pub mod patients;
pub mod users;
pub mod visits;

use uuid::Uuid;

use common::{
    access::{CurrentUser, Role},
    response::{ApiError, ApiResult},
};

use crate::state::AppState;

/// Managers see every patient, caregivers only those actively assigned to them
pub async fn ensure_patient_visible(
    state: &AppState,
    user: &CurrentUser,
    patient_id: Uuid,
) -> ApiResult<()> {
    if user.has_role(Role::Manager) || state.assignments.is_assigned(user.id, patient_id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}
