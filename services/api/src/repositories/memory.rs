//! In-memory repositories for router tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use common::{
    error::{DatabaseError, DatabaseResult},
    pagination::PageRequest,
};

use super::{
    AddressRepository, AssignmentRepository, PatientRepository, UserRepository, VisitRepository,
};
use crate::{
    geo::{BoundingBox, Coordinates},
    models::{
        address::{Address, NewAddress, Owner},
        assignment::{Assignment, AssignmentFilter, AssignmentStatus, NewAssignment},
        patient::{NewPatient, Patient, PatientFilter, PatientStatus, UpdatePatient},
        user::{UserChanges, UserFilter, UserRecord},
        visit::{NewVisit, Progress, Visit, VisitAction, VisitFilter, VisitStatus},
    },
};

/// Sorted, filtered page of a table snapshot
fn page_of<T: Clone>(
    mut items: Vec<T>,
    page: &PageRequest,
    key: impl Fn(&T) -> String,
) -> (Vec<T>, i64) {
    items.sort_by_key(|item| key(item));
    let total = items.len() as i64;
    (page.slice(&items), total)
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserRepository {
    pub fn insert(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<UserRecord>, i64)> {
        let users: Vec<UserRecord> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| filter.include_archived || u.status.is_listed())
            .cloned()
            .collect();
        Ok(page_of(users, page, |u| format!("{} {} {}", u.last_name, u.first_name, u.id)))
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<UserRecord>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<UserRecord>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        if changes.birthdate.is_some() {
            user.birthdate = changes.birthdate;
        }
        if changes.encrypted_ssn.is_some() {
            user.ssn = changes.encrypted_ssn.clone();
        }
        if changes.email.is_some() {
            user.email = changes.email.clone();
        }
        if changes.phone.is_some() {
            user.phone = changes.phone.clone();
        }
        if changes.photo_url.is_some() {
            user.photo_url = changes.photo_url.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.users.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryPatientRepository {
    patients: Mutex<HashMap<Uuid, Patient>>,
}

#[async_trait]
impl PatientRepository for InMemoryPatientRepository {
    async fn create(&self, patient: &NewPatient) -> DatabaseResult<Patient> {
        let now = Utc::now();
        let created = Patient {
            id: Uuid::new_v4(),
            patient_code: patient.patient_code.clone(),
            admission_code: patient.admission_code.clone(),
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            phone: patient.phone.clone(),
            status: PatientStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.patients.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Patient>> {
        Ok(self.patients.lock().unwrap().get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &PatientFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Patient>, i64)> {
        let patients: Vec<Patient> = self
            .patients
            .lock()
            .unwrap()
            .values()
            .filter(|p| filter.include_archived || p.status.is_listed())
            .filter(|p| filter.ids.as_ref().is_none_or(|ids| ids.contains(&p.id)))
            .cloned()
            .collect();
        Ok(page_of(patients, page, |p| format!("{} {} {}", p.last_name, p.first_name, p.id)))
    }

    async fn update(&self, id: Uuid, changes: &UpdatePatient) -> DatabaseResult<Option<Patient>> {
        let mut patients = self.patients.lock().unwrap();
        let Some(patient) = patients.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(code) = &changes.patient_code {
            patient.patient_code = code.clone();
        }
        if changes.admission_code.is_some() {
            patient.admission_code = changes.admission_code.clone();
        }
        if let Some(first_name) = &changes.first_name {
            patient.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            patient.last_name = last_name.clone();
        }
        if changes.phone.is_some() {
            patient.phone = changes.phone.clone();
        }
        patient.updated_at = Utc::now();
        Ok(Some(patient.clone()))
    }

    async fn set_status(&self, id: Uuid, status: PatientStatus) -> DatabaseResult<Option<Patient>> {
        let mut patients = self.patients.lock().unwrap();
        Ok(patients.get_mut(&id).map(|patient| {
            patient.status = status;
            patient.updated_at = Utc::now();
            patient.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.patients.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryAddressRepository {
    addresses: Mutex<HashMap<Uuid, Address>>,
}

#[async_trait]
impl AddressRepository for InMemoryAddressRepository {
    async fn create(&self, address: &NewAddress) -> DatabaseResult<Address> {
        let now = Utc::now();
        let created = Address {
            id: Uuid::new_v4(),
            owner: address.owner,
            street: address.street.clone(),
            street2: address.street2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip: address.zip.clone(),
            latitude: address.latitude,
            longitude: address.longitude,
            created_at: now,
            updated_at: now,
        };
        self.addresses.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Address>> {
        Ok(self.addresses.lock().unwrap().get(&id).cloned())
    }

    async fn list(
        &self,
        owner: Option<Owner>,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Address>, i64)> {
        let addresses: Vec<Address> = self
            .addresses
            .lock()
            .unwrap()
            .values()
            .filter(|a| owner.is_none_or(|owner| a.owner == owner))
            .cloned()
            .collect();
        Ok(page_of(addresses, page, |a| format!("{} {}", a.created_at.to_rfc3339(), a.id)))
    }

    async fn update(&self, address: &Address) -> DatabaseResult<Option<Address>> {
        let mut addresses = self.addresses.lock().unwrap();
        Ok(addresses.get_mut(&address.id).map(|stored| {
            *stored = Address {
                owner: stored.owner,
                created_at: stored.created_at,
                updated_at: Utc::now(),
                ..address.clone()
            };
            stored.clone()
        }))
    }

    async fn set_coordinates(
        &self,
        id: Uuid,
        coordinates: Coordinates,
    ) -> DatabaseResult<Option<Address>> {
        let mut addresses = self.addresses.lock().unwrap();
        Ok(addresses.get_mut(&id).map(|stored| {
            stored.latitude = Some(coordinates.latitude);
            stored.longitude = Some(coordinates.longitude);
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.addresses.lock().unwrap().remove(&id).is_some())
    }

    async fn within(&self, window: &BoundingBox) -> DatabaseResult<Vec<Address>> {
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.coordinates().is_some_and(|c| window.contains(&c)))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryVisitRepository {
    visits: Mutex<HashMap<Uuid, Visit>>,
}

#[async_trait]
impl VisitRepository for InMemoryVisitRepository {
    async fn create(&self, visit: &NewVisit, scheduled_by: Uuid) -> DatabaseResult<Visit> {
        if visit.end_time < visit.start_time {
            return Err(DatabaseError::CheckViolation("visits_time_order".to_string()));
        }
        let now = Utc::now();
        let created = Visit {
            id: Uuid::new_v4(),
            user_id: visit.user_id,
            patient_id: visit.patient_id,
            start_time: visit.start_time,
            end_time: visit.end_time,
            note: visit.note.clone(),
            progress: Progress::Scheduled,
            status: VisitStatus::Active,
            scheduled_by: Some(scheduled_by),
            checkin_by: None,
            checkout_by: None,
            canceled_by: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };
        self.visits.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Visit>> {
        Ok(self.visits.lock().unwrap().get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &VisitFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Visit>, i64)> {
        let visits: Vec<Visit> = self
            .visits
            .lock()
            .unwrap()
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        Ok(page_of(visits, page, |v| format!("{} {}", v.start_time, v.id)))
    }

    async fn update(&self, visit: &Visit) -> DatabaseResult<Option<Visit>> {
        let mut visits = self.visits.lock().unwrap();
        Ok(visits.get_mut(&visit.id).map(|stored| {
            stored.user_id = visit.user_id;
            stored.patient_id = visit.patient_id;
            stored.start_time = visit.start_time;
            stored.end_time = visit.end_time;
            stored.note = visit.note.clone();
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn set_status(&self, id: Uuid, status: VisitStatus) -> DatabaseResult<Option<Visit>> {
        let mut visits = self.visits.lock().unwrap();
        Ok(visits.get_mut(&id).map(|stored| {
            stored.status = status;
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: Progress,
        next: Progress,
        action: VisitAction,
        actor: Uuid,
    ) -> DatabaseResult<Option<Visit>> {
        let mut visits = self.visits.lock().unwrap();
        match visits.get_mut(&id) {
            Some(stored) if stored.progress == expected && stored.status == VisitStatus::Active => {
                stored.progress = next;
                stored.record(action, actor);
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.visits.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryAssignmentRepository {
    assignments: Mutex<HashMap<Uuid, Assignment>>,
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
    async fn create(&self, assignment: &NewAssignment, assigned_by: Uuid) -> DatabaseResult<Assignment> {
        let mut assignments = self.assignments.lock().unwrap();
        let duplicate = assignments
            .values()
            .any(|a| a.user_id == assignment.user_id && a.patient_id == assignment.patient_id);
        if duplicate {
            return Err(DatabaseError::UniqueViolation(
                "user_patients_pair_key".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Assignment {
            id: Uuid::new_v4(),
            user_id: assignment.user_id,
            patient_id: assignment.patient_id,
            assigned_by: Some(assigned_by),
            notes: assignment.notes.clone(),
            status: AssignmentStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assignments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Assignment>> {
        Ok(self.assignments.lock().unwrap().get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &AssignmentFilter,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Assignment>, i64)> {
        let assignments: Vec<Assignment> = self
            .assignments
            .lock()
            .unwrap()
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        Ok(page_of(assignments, page, |a| format!("{} {}", a.created_at.to_rfc3339(), a.id)))
    }

    async fn update_notes(&self, id: Uuid, notes: Option<&str>) -> DatabaseResult<Option<Assignment>> {
        let mut assignments = self.assignments.lock().unwrap();
        Ok(assignments.get_mut(&id).map(|stored| {
            stored.notes = notes.map(str::to_string);
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> DatabaseResult<Option<Assignment>> {
        let mut assignments = self.assignments.lock().unwrap();
        Ok(assignments.get_mut(&id).map(|stored| {
            stored.status = status;
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.assignments.lock().unwrap().remove(&id).is_some())
    }

    async fn assigned_patients(&self, user_id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.user_id == user_id && a.status == AssignmentStatus::Active)
            .map(|a| a.patient_id)
            .collect())
    }

    async fn is_assigned(&self, user_id: Uuid, patient_id: Uuid) -> DatabaseResult<bool> {
        Ok(self.assignments.lock().unwrap().values().any(|a| {
            a.user_id == user_id && a.patient_id == patient_id && a.status == AssignmentStatus::Active
        }))
    }
}
