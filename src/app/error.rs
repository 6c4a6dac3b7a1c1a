use std::borrow::Cow;

use validator::{ValidationError, ValidationErrors};

use crate::infra::repo::RepoError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user is awaiting approval")]
    NotApproved,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<RepoError> for ServiceError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(field) => {
                let mut errors = ValidationErrors::new();
                errors.add(field, taken(field));
                Self::Validation(errors)
            }
            RepoError::Database(err) => Self::Internal(err.into()),
        }
    }
}

/// Builds a field error with a human readable message.
pub fn field_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

pub fn taken(field: &'static str) -> ValidationError {
    field_error("unique", format!("{} has already been taken", field))
}

/// Merges the derive-level result with errors collected by hand.
pub fn merge(result: Result<(), ValidationErrors>, extra: Vec<(&'static str, ValidationError)>) -> ServiceResult<()> {
    let mut errors = result.err().unwrap_or_default();
    for (field, error) in extra {
        errors.add(field, error);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}
