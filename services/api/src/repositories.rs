//! Repositories for database operations
//!
//! Each resource has an `async_trait` repository with a PostgreSQL
//! implementation; handlers only see the trait objects.

pub mod addresses;
pub mod assignments;
pub mod patients;
pub mod users;
pub mod visits;

#[cfg(test)]
pub mod memory;

pub use addresses::{AddressRepository, PgAddressRepository};
pub use assignments::{AssignmentRepository, PgAssignmentRepository};
pub use patients::{PatientRepository, PgPatientRepository};
pub use users::{PgUserRepository, UserRepository};
pub use visits::{PgVisitRepository, VisitRepository};
