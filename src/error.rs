// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::auth::{password::PasswordError, IdentityError};
use crate::database::DatabaseError;

/// Client-facing message for every failed authentication, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "invalid authentication credentials";

const SERVER_ERROR: &str = "the server encountered a problem and could not process your request";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity
    UnprocessableEntity {
        field_errors: BTreeMap<String, String>,
    },

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity { .. } => "validation failed",
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::UnprocessableEntity { field_errors } => json!({ "error": field_errors }),
            _ => json!({ "error": self.message() }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// The one 401 every authentication failure collapses to.
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
    }

    pub fn not_permitted() -> Self {
        ApiError::Forbidden(
            "your user account doesn't have the necessary permissions to access this resource".to_string(),
        )
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("the requested resource could not be found".to_string())
    }

    pub fn method_not_allowed(method: &axum::http::Method) -> Self {
        ApiError::MethodNotAllowed(format!("the {} method is not supported for this resource", method))
    }

    pub fn edit_conflict() -> Self {
        ApiError::Conflict("unable to update the record due to an edit conflict, please try again".to_string())
    }

    pub fn failed_validation(field_errors: BTreeMap<String, String>) -> Self {
        ApiError::UnprocessableEntity { field_errors }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.into(), message.into());
        ApiError::UnprocessableEntity { field_errors }
    }

    pub fn rate_limit_exceeded() -> Self {
        ApiError::TooManyRequests("rate limit exceeded".to_string())
    }

    /// Log the underlying cause, hand the client a generic message.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("{}", cause);
        ApiError::InternalServerError(SERVER_ERROR.to_string())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => ApiError::not_found(),
            DatabaseError::EditConflict => ApiError::edit_conflict(),
            DatabaseError::DuplicateEmail => {
                ApiError::invalid_field("email", "a user with this email address already exists")
            }
            DatabaseError::Timeout(limit) => ApiError::internal(format!("database call exceeded {:?}", limit)),
            other => ApiError::internal(format!("database error: {}", other)),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(format!("password credential error: {}", err))
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_errors_use_error_key() {
        let body = ApiError::rate_limit_exceeded().to_json();
        assert_eq!(body, json!({ "error": "rate limit exceeded" }));
    }

    #[test]
    fn validation_errors_carry_field_map() {
        let err = ApiError::invalid_field("token", "must be provided");
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_json(), json!({ "error": { "token": "must be provided" } }));
    }

    #[test]
    fn database_errors_map_to_statuses() {
        assert_eq!(ApiError::from(DatabaseError::NotFound).status_code(), 404);
        assert_eq!(ApiError::from(DatabaseError::EditConflict).status_code(), 409);
        assert_eq!(ApiError::from(DatabaseError::DuplicateEmail).status_code(), 422);
        let timeout = ApiError::from(DatabaseError::Timeout(std::time::Duration::from_secs(3)));
        assert_eq!(timeout.status_code(), 500);
        assert_eq!(timeout.message(), SERVER_ERROR);
    }

    #[test]
    fn unauthorized_sets_www_authenticate() {
        let response = ApiError::invalid_credentials().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
