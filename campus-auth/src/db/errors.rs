use crate::db::classify::{self, DuplicateEntry, EngineError, ForeignKeyConstraintFail};
use thiserror::Error;

/// Rejection of malformed input, raised before any statement reaches the database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be `{prefix}-` followed by 12 digits, got {value:?}")]
    MalformedUuid {
        field: &'static str,
        prefix: &'static str,
        value: String,
    },

    #[error("{field} must be between {min} and {max} characters long, got {len}")]
    Length {
        field: &'static str,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("{field} contains characters outside the allowed set")]
    Charset { field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must be exactly {digits} digits")]
    Digits { field: &'static str, digits: usize },

    #[error("{field} is required")]
    Missing { field: &'static str },
}

/// Unified error type for accessor operations.
///
/// Database failures are classified exactly once, where they leave the driver; everything
/// above that point only matches on variants.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Zero rows matched a read
    #[error("Entity not found")]
    NotFound,

    #[error("Unique constraint violation: {0}")]
    DuplicateEntry(DuplicateEntry),

    #[error("Foreign key constraint violation: {0}")]
    ForeignKeyConstraintFail(ForeignKeyConstraintFail),

    /// A revision tried to carry an identity value
    #[error("{field} cannot be changed")]
    IdentityImmutable { field: &'static str },

    /// An engine error that matched no known code or grammar. Treat as internal.
    #[error("Unclassified database error: {0}")]
    Unclassified(EngineError),

    /// Catch-all for connection, pool and decoding failures
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<EngineError> for DbError {
    fn from(raw: EngineError) -> Self {
        classify::classify(raw)
    }
}

/// Convert from sqlx::Error, routing engine errors through the classifier
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                Some(mysql_err) => DbError::from(EngineError::new(mysql_err.number(), mysql_err.message())),
                None => DbError::Other(anyhow::Error::from(err)),
            },
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
