//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type. Variants map onto the error taxonomy: a caller
/// at the control-plane boundary matches on these to decide retry/surface
/// behavior instead of inspecting message strings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("admission denied: {0}")]
    Admission(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("re-authentication needed: {0}")]
    AuthExpired(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("race detected, request superseded: {0}")]
    Race(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn admission(msg: impl Into<String>) -> Self {
        Self::Admission(msg.into())
    }

    /// Whether the dispatcher should retry a step that failed with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Database(_) | Error::Io(_))
    }
}

impl From<crate::database::repositories::errors::RepositoryError> for Error {
    fn from(e: crate::database::repositories::errors::RepositoryError) -> Self {
        use crate::database::repositories::errors::RepositoryError as R;
        match e {
            R::NotFound { entity_type, id } => Error::NotFound { entity_type, id },
            R::Database(e) => Error::Database(e),
            R::Validation(msg) => Error::Validation(msg),
            R::Json(e) => Error::Serialization(e),
            R::Race(msg) => Error::Race(msg),
        }
    }
}
