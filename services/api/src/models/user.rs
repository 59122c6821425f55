//! User profiles

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::OnceLock;
use uuid::Uuid;

use common::{
    access::{AccountStatus, Role},
    crypto::FieldCipher,
};

use super::checks;

/// Profile row joined with its account
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    /// Encrypted at rest
    pub ssn: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as returned to clients; the SSN is only ever masked
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub ssn: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    pub fn new(record: UserRecord, cipher: Option<&FieldCipher>) -> Self {
        let ssn = record.ssn.as_deref().map(|stored| {
            cipher
                .and_then(|cipher| cipher.decrypt(stored).ok())
                .map(|plain| mask_ssn(&plain))
                .unwrap_or_else(|| "***-**-****".to_string())
        });

        Self {
            id: record.id,
            username: record.username,
            role: record.role,
            status: record.status,
            first_name: record.first_name,
            last_name: record.last_name,
            birthdate: record.birthdate,
            ssn,
            email: record.email,
            phone: record.phone,
            photo_url: record.photo_url,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Profile changes; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub ssn: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

impl UpdateUser {
    pub fn validate(&self, today: NaiveDate) -> Result<(), String> {
        if let Some(first_name) = &self.first_name {
            checks::required("First name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            checks::required("Last name", last_name)?;
        }
        if let Some(birthdate) = self.birthdate {
            if birthdate > today {
                return Err("Birthdate cannot be in the future".to_string());
            }
        }
        if let Some(ssn) = &self.ssn {
            normalize_ssn(ssn)?;
        }
        if let Some(email) = &self.email {
            checks::email(email)?;
        }
        if let Some(phone) = &self.phone {
            checks::phone(phone)?;
        }
        if let Some(photo_url) = &self.photo_url {
            if !(photo_url.starts_with("https://") || photo_url.starts_with("http://")) {
                return Err("Photo URL must be an http(s) URL".to_string());
            }
        }
        Ok(())
    }
}

/// Validated changes ready to persist, SSN already sealed
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub encrypted_ssn: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

/// Listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    #[serde(default)]
    pub include_archived: bool,
}

/// Canonical `NNN-NN-NNNN` form of an SSN given with or without dashes
pub fn normalize_ssn(value: &str) -> Result<String, String> {
    static SSN: OnceLock<Regex> = OnceLock::new();
    let regex = SSN.get_or_init(|| {
        Regex::new(r"^(\d{3})-?(\d{2})-?(\d{4})$").expect("Failed to compile SSN regex")
    });

    let captures = regex
        .captures(value.trim())
        .ok_or_else(|| "SSN must be NNN-NN-NNNN or nine digits".to_string())?;
    Ok(format!("{}-{}-{}", &captures[1], &captures[2], &captures[3]))
}

pub fn mask_ssn(ssn: &str) -> String {
    let digits: String = ssn.chars().filter(char::is_ascii_digit).collect();
    let last_four = digits.get(digits.len().saturating_sub(4)..).unwrap_or_default();
    format!("***-**-{}", last_four)
}
