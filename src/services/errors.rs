use thiserror::Error;

use crate::repository::RepositoryError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the listing services to the HTTP layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing listing or one owned by somebody else.
    #[error("listing not found")]
    NotFound,
    /// User facing messages, in form order.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("invalid form: {0}")]
    Form(String),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => ServiceError::NotFound,
            other => ServiceError::Repository(other),
        }
    }
}
