use sea_orm::{DbErr, TransactionError};
use std::fmt::Display;
use validator::ValidationErrors;

/// Errors surfaced by every ledger operation.
///
/// Nothing is retried internally: each variant reaches the caller from the
/// operation that detected it.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Field-level rejection. Every failing field is reported, not just the first.
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// `NotFound` for a record of `kind` that is absent or owned by someone else.
    pub fn not_found(kind: &str, id: impl Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", kind, id))
    }

    pub fn missing_owner() -> Self {
        ServiceError::AuthError("no authenticated user".to_string())
    }

    /// Machine-readable error code for presentation layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "persistence_error",
            Self::NotFound(_) => "resource_not_found",
            Self::ValidationError(_) => "validation_error",
            Self::AuthError(_) => "authentication_failed",
            Self::Conflict(_) => "conflict",
            Self::EventError(_) | Self::InternalError(_) => "internal_error",
        }
    }

    /// Field names rejected by validation, empty for every other variant.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        match self {
            Self::ValidationError(errors) => {
                let mut fields: Vec<&'static str> = errors.errors().keys().copied().collect();
                fields.sort_unstable();
                fields
            }
            _ => Vec::new(),
        }
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}
