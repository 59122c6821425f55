//! Caregiver to patient assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum AssignmentStatus {
    Inactive = 0,
    Active = 1,
}

super::numeric_code!(AssignmentStatus, "assignment status", {
    Inactive = 0,
    Active = 1,
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub patient_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub notes: Option<String>,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub user_id: Uuid,
    pub patient_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAssignment {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    pub user_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.user_id.is_none_or(|id| assignment.user_id == id)
            && self.patient_id.is_none_or(|id| assignment.patient_id == id)
            && (self.include_inactive || assignment.status == AssignmentStatus::Active)
    }
}
