//! Application state shared across handlers

use std::sync::Arc;

use common::{crypto::FieldCipher, middleware::Authenticator};

use crate::{
    geocoder::Geocoder,
    repositories::{
        AddressRepository, AssignmentRepository, PatientRepository, UserRepository,
        VisitRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub users: Arc<dyn UserRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub visits: Arc<dyn VisitRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    /// Present when a geocoder URL is configured
    pub geocoder: Option<Arc<dyn Geocoder>>,
    /// Present when a field encryption key is configured
    pub cipher: Option<FieldCipher>,
}
