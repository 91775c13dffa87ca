use crate::db::errors::DbError;
use thiserror::Error as ThisError;

/// Top-level error for the binary and for embedding applications.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing or inconsistent configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the failure is the caller's fault (bad input, key conflicts) rather than an
    /// internal one.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Database(
                DbError::Validation(_)
                    | DbError::NotFound
                    | DbError::DuplicateEntry(_)
                    | DbError::ForeignKeyConstraintFail(_)
                    | DbError::IdentityImmutable { .. }
            )
        )
    }
}
