//! Uniform JSON envelope and the API error type
//!
//! Every response body, success or failure, has the shape
//! `{status, code, message?, data?}`.

use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub use axum_extra::extract::WithRejection;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::error;

use crate::error::DatabaseError;

/// JSON request body whose rejections render as the error envelope
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Query string parameters, rejected with the error envelope
pub type QueryParams<T> = WithRejection<Query<T>, ApiError>;

/// Path parameters, rejected with the error envelope
pub type PathParams<T> = WithRejection<Path<T>, ApiError>;

/// Human-readable messages shared by both services
pub mod messages {
    pub const TOKEN_MISSING: &str = "Authorization token is missing";
    pub const TOKEN_INVALID: &str = "Authorization token is invalid";
    pub const TOKEN_EXPIRED: &str = "Authorization token has expired";
    pub const TOKEN_REVOKED: &str = "Authorization token is no longer valid";
    pub const ACCOUNT_NOT_VERIFIED: &str = "Account has not been verified";
    pub const ACCOUNT_INACTIVE: &str = "Account is inactive";
    pub const ACCOUNT_UNAVAILABLE: &str = "Account is no longer available";
    pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
    pub const INSUFFICIENT_ROLE: &str = "You do not have permission to perform this action";
    pub const INTERNAL_ERROR: &str = "Internal server error";
}

static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include internal error details in 500 responses (development only)
pub fn expose_error_details(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

fn error_details_exposed() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

/// Response envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Successful response
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    message: Option<String>,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            data: Some(data),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Message-only response
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: "success",
            code: self.status.as_u16(),
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Custom error type for the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden(messages::INSUFFICIENT_ROLE.to_string())
    }

    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(DatabaseError::UniqueViolation(_)) => StatusCode::CONFLICT,
            ApiError::Database(
                DatabaseError::ForeignKeyViolation(_) | DatabaseError::CheckViolation(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Database(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Database(DatabaseError::UniqueViolation(_)) => {
                "A record with these values already exists".to_string()
            }
            ApiError::Database(DatabaseError::ForeignKeyViolation(_)) => {
                "Referenced record does not exist".to_string()
            }
            ApiError::Database(DatabaseError::CheckViolation(_)) => {
                "Record violates a data constraint".to_string()
            }
            ApiError::Database(DatabaseError::NotFound) => "Record not found".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => {
                if error_details_exposed() {
                    format!("{}: {:#}", messages::INTERNAL_ERROR, self)
                } else {
                    messages::INTERNAL_ERROR.to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        }

        let body = Envelope::<()> {
            status: "error",
            code: status.as_u16(),
            message: Some(self.public_message()),
            data: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ApiError::UnsupportedMediaType(
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Render a caught panic as the generic 500 envelope
pub fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!("Handler panicked");
    ApiError::Internal(anyhow::anyhow!("handler panicked")).into_response()
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
