//! Visits and the progress state machine
//!
//! ```text
//! Scheduled --checkin--> InProgress --checkout--> Completed --approve--> Paid
//!     |                      |
//!     +-------cancel---------+------> Canceled (terminal)
//! ```
//!
//! Re-applying an action is an error, never a no-op.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Visit progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum Progress {
    Canceled = -1,
    Scheduled = 0,
    InProgress = 1,
    Completed = 2,
    Paid = 3,
}

super::numeric_code!(Progress, "visit progress", {
    Canceled = -1,
    Scheduled = 0,
    InProgress = 1,
    Completed = 2,
    Paid = 3,
});

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Progress::Canceled => "canceled",
            Progress::Scheduled => "scheduled",
            Progress::InProgress => "in progress",
            Progress::Completed => "completed",
            Progress::Paid => "paid",
        })
    }
}

/// Progress-changing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    CheckIn,
    CheckOut,
    Approve,
    Cancel,
}

impl VisitAction {
    /// Column recording who performed the action
    pub fn audit_column(self) -> &'static str {
        match self {
            VisitAction::CheckIn => "checkin_by",
            VisitAction::CheckOut => "checkout_by",
            VisitAction::Approve => "approved_by",
            VisitAction::Cancel => "canceled_by",
        }
    }
}

impl fmt::Display for VisitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VisitAction::CheckIn => "check in",
            VisitAction::CheckOut => "check out",
            VisitAction::Approve => "approve",
            VisitAction::Cancel => "cancel",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {action} a visit that is {from}")]
pub struct TransitionError {
    pub action: VisitAction,
    pub from: Progress,
}

impl Progress {
    /// The progress reached by applying `action`
    pub fn apply(self, action: VisitAction) -> Result<Progress, TransitionError> {
        match (self, action) {
            (Progress::Scheduled, VisitAction::CheckIn) => Ok(Progress::InProgress),
            (Progress::InProgress, VisitAction::CheckOut) => Ok(Progress::Completed),
            (Progress::Completed, VisitAction::Approve) => Ok(Progress::Paid),
            (Progress::Scheduled | Progress::InProgress, VisitAction::Cancel) => {
                Ok(Progress::Canceled)
            }
            (from, action) => Err(TransitionError { action, from }),
        }
    }
}

/// Visit record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum VisitStatus {
    Active = 1,
    Archived = 2,
    SoftDeleted = 3,
}

super::numeric_code!(VisitStatus, "visit status", {
    Active = 1,
    Archived = 2,
    SoftDeleted = 3,
});

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub note: Option<String>,
    pub progress: Progress,
    pub status: VisitStatus,
    pub scheduled_by: Option<Uuid>,
    pub checkin_by: Option<Uuid>,
    pub checkout_by: Option<Uuid>,
    pub canceled_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Apply an update, leaving absent fields untouched
    pub fn merged(&self, update: &UpdateVisit) -> Visit {
        let mut merged = self.clone();
        if let Some(user_id) = update.user_id {
            merged.user_id = user_id;
        }
        if let Some(patient_id) = update.patient_id {
            merged.patient_id = patient_id;
        }
        if let Some(start_time) = update.start_time {
            merged.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            merged.end_time = end_time;
        }
        if let Some(note) = &update.note {
            merged.note = Some(note.clone());
        }
        merged
    }

    /// Record `actor` in the audit column of `action`
    pub fn record(&mut self, action: VisitAction, actor: Uuid) {
        let column = match action {
            VisitAction::CheckIn => &mut self.checkin_by,
            VisitAction::CheckOut => &mut self.checkout_by,
            VisitAction::Approve => &mut self.approved_by,
            VisitAction::Cancel => &mut self.canceled_by,
        };
        *column = Some(actor);
    }
}

pub fn validate_times(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), String> {
    if end < start {
        Err("End time must not be before start time".to_string())
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVisit {
    pub user_id: Uuid,
    pub patient_id: Uuid,
    #[serde(deserialize_with = "crate::models::datetime::deserialize")]
    pub start_time: NaiveDateTime,
    #[serde(deserialize_with = "crate::models::datetime::deserialize")]
    pub end_time: NaiveDateTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVisit {
    pub user_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "crate::models::datetime::option::deserialize")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "crate::models::datetime::option::deserialize")]
    pub end_time: Option<NaiveDateTime>,
    pub note: Option<String>,
}

/// `GET /visits` filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitFilter {
    pub user_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub progress: Option<Progress>,
    /// Visits starting at or after
    #[serde(default, deserialize_with = "crate::models::datetime::option::deserialize")]
    pub from: Option<NaiveDateTime>,
    /// Visits starting before
    #[serde(default, deserialize_with = "crate::models::datetime::option::deserialize")]
    pub to: Option<NaiveDateTime>,
    #[serde(default)]
    pub include_archived: bool,
}

impl VisitFilter {
    pub fn matches(&self, visit: &Visit) -> bool {
        self.user_id.is_none_or(|id| visit.user_id == id)
            && self.patient_id.is_none_or(|id| visit.patient_id == id)
            && self.progress.is_none_or(|progress| visit.progress == progress)
            && self.from.is_none_or(|from| visit.start_time >= from)
            && self.to.is_none_or(|to| visit.start_time < to)
            && (self.include_archived || visit.status == VisitStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [Progress; 5] = [
        Progress::Canceled,
        Progress::Scheduled,
        Progress::InProgress,
        Progress::Completed,
        Progress::Paid,
    ];

    #[test]
    fn happy_path() {
        let progress = Progress::Scheduled
            .apply(VisitAction::CheckIn)
            .and_then(|p| p.apply(VisitAction::CheckOut))
            .and_then(|p| p.apply(VisitAction::Approve))
            .unwrap();
        assert_eq!(progress, Progress::Paid);
    }

    #[test]
    fn checkout_requires_checkin() {
        assert_eq!(
            Progress::Scheduled.apply(VisitAction::CheckOut),
            Err(TransitionError {
                action: VisitAction::CheckOut,
                from: Progress::Scheduled,
            })
        );
    }

    #[test]
    fn cancel_only_before_checkout() {
        assert_eq!(
            Progress::Scheduled.apply(VisitAction::Cancel),
            Ok(Progress::Canceled)
        );
        assert_eq!(
            Progress::InProgress.apply(VisitAction::Cancel),
            Ok(Progress::Canceled)
        );
        assert!(Progress::Completed.apply(VisitAction::Cancel).is_err());
        assert!(Progress::Paid.apply(VisitAction::Cancel).is_err());
    }

    #[test]
    fn canceled_is_terminal() {
        for action in [
            VisitAction::CheckIn,
            VisitAction::CheckOut,
            VisitAction::Approve,
            VisitAction::Cancel,
        ] {
            assert!(Progress::Canceled.apply(action).is_err());
        }
    }

    #[test]
    fn repeating_an_action_is_an_error() {
        let checked_in = Progress::Scheduled.apply(VisitAction::CheckIn).unwrap();
        let err = checked_in.apply(VisitAction::CheckIn).unwrap_err();
        assert_eq!(err.to_string(), "Cannot check in a visit that is in progress");
    }

    #[test]
    fn every_state_has_at_most_one_successor_per_action() {
        for from in ALL {
            let legal = [
                VisitAction::CheckIn,
                VisitAction::CheckOut,
                VisitAction::Approve,
                VisitAction::Cancel,
            ]
            .into_iter()
            .filter(|action| from.apply(*action).is_ok())
            .count();
            let expected = match from {
                Progress::Scheduled | Progress::InProgress => 2,
                Progress::Completed => 1,
                Progress::Canceled | Progress::Paid => 0,
            };
            assert_eq!(legal, expected, "{}", from);
        }
    }

    #[test]
    fn progress_codes_round_trip_through_json() {
        for progress in ALL {
            let value = serde_json::to_value(progress).unwrap();
            assert_eq!(value, json!(i16::from(progress)));
        }
        assert!(serde_json::from_value::<Progress>(json!(7)).is_err());
    }

    #[test]
    fn new_visit_accepts_lenient_times() {
        let visit: NewVisit = serde_json::from_value(json!({
            "user_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "start_time": "2025-01-01 10:00",
            "end_time": "2025-01-01T11:30:00",
        }))
        .unwrap();
        assert!(validate_times(visit.start_time, visit.end_time).is_ok());
        assert!(validate_times(visit.end_time, visit.start_time).is_err());
    }
}
