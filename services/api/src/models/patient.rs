//! Patients linked to the partner system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::checks;

/// Patient status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum PatientStatus {
    Active = 0,
    Archived = 1,
    Deleted = 2,
}

super::numeric_code!(PatientStatus, "patient status", {
    Active = 0,
    Archived = 1,
    Deleted = 2,
});

impl PatientStatus {
    pub fn is_listed(self) -> bool {
        self == PatientStatus::Active
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatientStatus::Active => "active",
            PatientStatus::Archived => "archived",
            PatientStatus::Deleted => "deleted",
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Patient {
    pub id: Uuid,
    /// Identifier in the partner system
    pub patient_code: String,
    pub admission_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub patient_code: String,
    pub admission_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), String> {
        checks::required("Patient code", &self.patient_code)?;
        checks::required("First name", &self.first_name)?;
        checks::required("Last name", &self.last_name)?;
        if let Some(phone) = &self.phone {
            checks::phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatient {
    pub patient_code: Option<String>,
    pub admission_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdatePatient {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(code) = &self.patient_code {
            checks::required("Patient code", code)?;
        }
        if let Some(first_name) = &self.first_name {
            checks::required("First name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            checks::required("Last name", last_name)?;
        }
        if let Some(phone) = &self.phone {
            checks::phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// Repository-level listing filter
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub include_archived: bool,
    /// Restrict to these ids (a caregiver's assignments)
    pub ids: Option<Vec<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_patient_requires_code_and_names() {
        let mut patient = NewPatient {
            patient_code: "P-1001".to_string(),
            admission_code: Some("A-77".to_string()),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: Some("555-123-4567".to_string()),
        };
        assert!(patient.validate().is_ok());

        patient.patient_code = String::new();
        assert_eq!(patient.validate().unwrap_err(), "Patient code is required");
    }

    #[test]
    fn status_codes() {
        assert_eq!(i16::from(PatientStatus::Archived), 1);
        assert_eq!(PatientStatus::try_from(2), Ok(PatientStatus::Deleted));
        assert!(PatientStatus::try_from(5).is_err());
        assert!(!PatientStatus::Deleted.is_listed());
    }
}
