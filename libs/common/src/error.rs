//! Custom error types for the common library
//!
//! This module defines the database error type shared by every repository
//! in the workspace, along with the classification of raw `sqlx` errors
//! into constraint violations the HTTP layer can report precisely.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// PostgreSQL SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for foreign key violations
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL SQLSTATE for check constraint violations
const CHECK_VIOLATION: &str = "23514";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write
    #[error("Duplicate value violates constraint {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist
    #[error("Referenced row does not exist ({0})")]
    ForeignKeyViolation(String),

    /// A check constraint rejected the write
    #[error("Value rejected by constraint {0}")]
    CheckViolation(String),

    /// The row addressed by the operation does not exist
    #[error("Row not found")]
    NotFound,
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => DatabaseError::NotFound,
            SqlxError::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => DatabaseError::UniqueViolation(constraint),
                    Some(FOREIGN_KEY_VIOLATION) => DatabaseError::ForeignKeyViolation(constraint),
                    Some(CHECK_VIOLATION) => DatabaseError::CheckViolation(constraint),
                    _ => DatabaseError::Query(err),
                }
            }
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Connection(err)
            }
            _ => DatabaseError::Query(err),
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: DatabaseError = SqlxError::RowNotFound.into();
        assert!(matches!(err, DatabaseError::NotFound));
    }

    #[test]
    fn pool_timeout_maps_to_connection() {
        let err: DatabaseError = SqlxError::PoolTimedOut.into();
        assert!(matches!(err, DatabaseError::Connection(_)));
    }

    #[test]
    fn other_errors_map_to_query() {
        let err: DatabaseError = SqlxError::ColumnNotFound("role".into()).into();
        assert!(matches!(err, DatabaseError::Query(_)));
    }
}
