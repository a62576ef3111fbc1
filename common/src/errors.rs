// Error handling framework

use thiserror::Error;

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Value too long: {0}")]
    ValueTooLong(String),

    #[error("Schema initialization failed for table '{table}': {reason}")]
    SchemaInitFailed { table: String, reason: String },
}

/// Validation errors for incoming payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

impl ValidationError {
    /// Reject a required string that is present but blank
    pub fn require_non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: field.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Reject a string longer than its `VARCHAR(max)` column, counted in characters
    pub fn require_max_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
        if value.chars().count() > max {
            return Err(ValidationError::InvalidFieldValue {
                field: field.to_string(),
                reason: format!("must be at most {} characters", max),
            });
        }
        Ok(())
    }
}

// SQLSTATE codes surfaced to callers
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => DatabaseError::DuplicateKey(db_err.message().to_string()),
                Some(FOREIGN_KEY_VIOLATION) => {
                    DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                }
                Some(STRING_DATA_RIGHT_TRUNCATION) => {
                    DatabaseError::ValueTooLong(db_err.message().to_string())
                }
                _ => DatabaseError::QueryFailed(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}
