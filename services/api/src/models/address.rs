//! Addresses and their owners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::checks;
use crate::geo::Coordinates;

/// Who an address belongs to
///
/// Serialised as `{"type": "user", "id": "..."}`, `{"type": "patient", ...}`
/// or `{"type": "system"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Owner {
    System,
    User(Uuid),
    Patient(Uuid),
}

impl Owner {
    const SYSTEM: i16 = -1;
    const USER: i16 = 0;
    const PATIENT: i16 = 1;

    /// Rebuild from the `(person_type, person_id)` column pair
    pub fn from_columns(person_type: i16, person_id: Option<Uuid>) -> Result<Self, String> {
        match (person_type, person_id) {
            (Self::SYSTEM, None) => Ok(Owner::System),
            (Self::USER, Some(id)) => Ok(Owner::User(id)),
            (Self::PATIENT, Some(id)) => Ok(Owner::Patient(id)),
            (kind, id) => Err(format!("invalid address owner {} / {:?}", kind, id)),
        }
    }

    pub fn person_type(&self) -> i16 {
        match self {
            Owner::System => Self::SYSTEM,
            Owner::User(_) => Self::USER,
            Owner::Patient(_) => Self::PATIENT,
        }
    }

    pub fn person_id(&self) -> Option<Uuid> {
        match self {
            Owner::System => None,
            Owner::User(id) | Owner::Patient(id) => Some(*id),
        }
    }
}

/// Raw `addresses` row
#[derive(Debug, Clone, FromRow)]
pub struct AddressRow {
    pub id: Uuid,
    pub person_id: Option<Uuid>,
    pub person_type: i16,
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub id: Uuid,
    pub owner: Owner,
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = String;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: Owner::from_columns(row.person_type, row.person_id)?,
            street: row.street,
            street2: row.street2,
            city: row.city,
            // CHAR columns come back space padded
            state: row.state.trim_end().to_string(),
            zip: row.zip.trim_end().to_string(),
            latitude: row.latitude,
            longitude: row.longitude,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Address {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude?, self.longitude?).ok()
    }

    /// Apply an update, leaving absent fields untouched
    pub fn merged(&self, update: &UpdateAddress) -> Address {
        let mut merged = self.clone();
        if let Some(street) = &update.street {
            merged.street = street.clone();
        }
        if let Some(street2) = &update.street2 {
            merged.street2 = Some(street2.clone());
        }
        if let Some(city) = &update.city {
            merged.city = city.clone();
        }
        if let Some(state) = &update.state {
            merged.state = state.clone();
        }
        if let Some(zip) = &update.zip {
            merged.zip = zip.clone();
        }
        if update.latitude.is_some() || update.longitude.is_some() {
            merged.latitude = update.latitude;
            merged.longitude = update.longitude;
        }
        merged
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.street,
            &self.city,
            &self.state,
            &self.zip,
            self.latitude,
            self.longitude,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub owner: Owner,
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewAddress {
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.street,
            &self.city,
            &self.state,
            &self.zip,
            self.latitude,
            self.longitude,
        )
    }
}

/// Address changes; coordinates are replaced as a pair
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAddress {
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn validate_fields(
    street: &str,
    city: &str,
    state: &str,
    zip: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), String> {
    checks::required("Street", street)?;
    checks::required("City", city)?;

    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("State must be two uppercase letters".to_string());
    }
    if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
        return Err("Zip must be five digits".to_string());
    }

    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        _ => Err("Latitude and longitude must be given together".to_string()),
    }
}

/// `GET /addresses` filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressQuery {
    pub owner_type: Option<String>,
    pub owner_id: Option<Uuid>,
}

impl AddressQuery {
    pub fn owner(&self) -> Result<Option<Owner>, String> {
        match (self.owner_type.as_deref(), self.owner_id) {
            (None, None) => Ok(None),
            (Some("system"), None) => Ok(Some(Owner::System)),
            (Some("user"), Some(id)) => Ok(Some(Owner::User(id))),
            (Some("patient"), Some(id)) => Ok(Some(Owner::Patient(id))),
            _ => Err("owner_type must be system, or user/patient with an owner_id".to_string()),
        }
    }
}

/// `GET /addresses/nearby` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
    /// Drop box matches farther than `radius`
    #[serde(default)]
    pub exact: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyAddress {
    #[serde(flatten)]
    pub address: Address,
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Distance {
    pub miles: Option<f64>,
}
