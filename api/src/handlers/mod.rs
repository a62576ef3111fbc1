pub mod health;
pub mod metrics;
pub mod todos;
pub mod users;

// Common response types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::{DatabaseError, ValidationError};
use serde::Serialize;

/// Error categories the HTTP layer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard API error response, serialized as `{"error": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
        }
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, error)
    }

    pub fn not_found(entity: Entity) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", entity.label()))
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, error)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, "Internal server error")
    }

    /// Map a storage failure for `entity` to a response.
    ///
    /// Reference violations are context dependent, so callers that can hit
    /// one match on `DatabaseError::ForeignKeyViolation` before falling back
    /// to this mapping.
    pub fn from_database(entity: Entity, err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => Self::not_found(entity),
            DatabaseError::DuplicateKey(detail) => {
                tracing::debug!(entity = entity.label(), detail = %detail, "Duplicate key");
                Self::conflict(entity.duplicate_message())
            }
            DatabaseError::ValueTooLong(detail) => Self::validation(detail),
            DatabaseError::ConnectionFailed(detail) | DatabaseError::HealthCheckFailed(detail) => {
                tracing::error!(error = %detail, "Database unavailable");
                Self::new(ErrorKind::Unavailable, "Database unavailable")
            }
            other => {
                tracing::error!(error = %other, entity = entity.label(), "Database operation failed");
                Self::internal()
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl From<ValidationError> for ErrorResponse {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Entities exposed over HTTP, used to word error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Todo,
    User,
}

impl Entity {
    pub fn label(self) -> &'static str {
        match self {
            Entity::Todo => "Todo",
            Entity::User => "User",
        }
    }

    fn duplicate_message(self) -> &'static str {
        match self {
            Entity::Todo => "Todo already exists",
            Entity::User => "A user with this username or email already exists",
        }
    }
}

/// Body returned by successful deletes
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_wording() {
        let todo = ErrorResponse::from_database(Entity::Todo, DatabaseError::NotFound("7".into()));
        let user = ErrorResponse::from_database(Entity::User, DatabaseError::NotFound("7".into()));

        assert_eq!(todo.status(), StatusCode::NOT_FOUND);
        assert_eq!(todo.error, "Todo not found");
        assert_eq!(user.error, "User not found");
    }

    #[test]
    fn test_database_error_statuses() {
        let cases = [
            (DatabaseError::DuplicateKey("users_email_key".into()), StatusCode::CONFLICT),
            (DatabaseError::QueryFailed("syntax".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                DatabaseError::ValueTooLong("value too long for type character varying(80)".into()),
                StatusCode::BAD_REQUEST,
            ),
            (DatabaseError::ConnectionFailed("refused".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(ErrorResponse::from_database(Entity::User, err).status(), expected);
        }
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response =
            ErrorResponse::from_database(Entity::Todo, DatabaseError::QueryFailed("relation \"todos\" does not exist".into()));
        let body = serde_json::to_value(&response).unwrap();

        assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let response = ErrorResponse::from(ValidationError::InvalidFieldValue {
            field: "title".into(),
            reason: "must not be empty".into(),
        });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.error.contains("title"));
    }
}
