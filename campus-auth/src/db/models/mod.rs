//! Account records and their revision objects.
//!
//! An entity is a full row. A revision is the sparse counterpart used for partial updates
//! and for criteria reads: every field is optional and `None` means "not supplied".

pub mod auth;
pub mod inform;

use std::fmt;

use crate::db::errors::{DbError, ValidationError};
use crate::db::fields::{Columns, FieldValue, Validate};
use crate::db::schema::Table;

/// A synthetic uniqueness rule spanning several columns.
///
/// The engine has no duplicate detector for these, so the accessor checks them inside the
/// transaction before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    /// Reported as the duplicate-entry key.
    pub key: &'static str,
    /// Reported as the duplicate-entry value.
    pub entry: String,
    /// Equality filter locating rows that share the key.
    pub filter: Columns,
}

pub trait Entity: Sized + Send + Sync {
    type Id: FieldValue + Validate + Clone + fmt::Display + Send + Sync;

    const TABLE: &'static Table;

    /// Columns covered by [`Entity::composite_key`].
    const COMPOSITE_COLUMNS: &'static [&'static str] = &[];

    fn identity(&self) -> &Self::Id;

    fn validate(&self) -> Result<(), ValidationError>;

    /// All stored columns except the engine-maintained timestamps.
    fn to_columns(&self) -> Columns;

    fn from_columns(columns: Columns) -> Result<Self, DbError>;

    fn composite_key(&self) -> Option<CompositeKey> {
        None
    }
}

/// Entities that can be looked up by a login identifier.
pub trait AuthEntity: Entity {
    type LoginId: FieldValue + Validate + Clone + fmt::Display + Send + Sync;
}

pub trait Revision: Send + Sync {
    type Target: Entity;

    /// The identity field, which a revision must never carry when used as an update.
    fn identity(&self) -> Option<&<Self::Target as Entity>::Id>;

    /// Validate every supplied field.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Column map of the supplied non-identity fields.
    fn payload(&self) -> Columns;

    /// Payload plus the identity, if supplied. Used when the revision is a read filter.
    fn criteria(&self) -> Columns {
        let mut columns = self.payload();
        if let Some(id) = self.identity() {
            columns.insert(<<Self::Target as Entity>::Id as FieldValue>::KEY, id.to_value());
        }
        columns
    }
}

/// Validate each supplied field in turn, stopping at the first failure.
fn validate_all(checks: &[&dyn Validate]) -> Result<(), ValidationError> {
    checks.iter().try_for_each(|c| c.validate())
}
