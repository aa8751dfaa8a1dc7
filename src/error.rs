// Error types for the expense tracker
//
// Setup code and binaries use anyhow; operations that the API maps to HTTP
// status codes return `TrackerError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Rejected input (blank title, short password, bad filter value, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint hit (username or email already registered)
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Bad credentials, unknown or expired token
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        TrackerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Errors caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrackerError::Validation(_)
                | TrackerError::NotFound { .. }
                | TrackerError::Conflict(_)
                | TrackerError::Unauthorized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = TrackerError::not_found("expense", 42);
        assert_eq!(err.to_string(), "expense not found: 42");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_database_error_is_server_side() {
        let err: TrackerError = rusqlite::Error::InvalidQuery.into();
        assert!(!err.is_client_error());
        assert!(err.to_string().starts_with("Database error"));
    }
}
