use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by the Diesel-backed repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The record does not exist or is not visible to the caller.
    #[error("record not found")]
    NotFound,
    /// A uniqueness, foreign key or listing invariant would be broken.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("database error: {0}")]
    DatabaseError(DieselError),
    #[error("connection pool error: {0}")]
    ConnectionError(#[from] diesel::r2d2::PoolError),
}

impl From<DieselError> for RepositoryError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => RepositoryError::NotFound,
            DieselError::DatabaseError(
                kind @ (DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::CheckViolation
                | DatabaseErrorKind::NotNullViolation),
                info,
            ) => RepositoryError::ConstraintViolation(format!("{kind:?}: {}", info.message())),
            other => RepositoryError::DatabaseError(other),
        }
    }
}
