//! Classification of raw engine errors into typed constraint failures, and back.
//!
//! The relational engine reports constraint violations only as numbered errors with a
//! textual message. Two families matter to the account schema:
//!
//! ```text
//! 1062  Duplicate entry `<entry>` for key `<key>`
//! 1452  Cannot add or update a child row: a foreign key constraint fails
//!       (`<db>`.`<table>`, CONSTRAINT `<constraint>` FOREIGN KEY (`<attribute>`)
//!       REFERENCES `<ref table>` (`<ref attribute>`))
//! 1451  Cannot delete or update a parent row: a foreign key constraint fails (...same tokens...)
//! ```
//!
//! [`DuplicateEntry::generate`] / [`DuplicateEntry::parse`] and
//! [`ForeignKeyConstraintFail::generate`] / [`ForeignKeyConstraintFail::parse`] are exact
//! inverses for any key and foreign-key token text free of backticks; a duplicate entry value may
//! contain them. Anything that does not match a known code
//! and token layout stays unclassified; callers must treat it as an internal failure.
//!
//! This is the only module that inspects engine error text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::db::errors::DbError;

/// `ER_DUP_ENTRY`
pub const ER_DUP_ENTRY: u16 = 1062;
/// `ER_ROW_IS_REFERENCED_2`: deleting or re-keying a parent that still has children.
pub const ER_ROW_IS_REFERENCED: u16 = 1451;
/// `ER_NO_REFERENCED_ROW_2`: inserting or updating a child whose parent does not exist.
pub const ER_NO_REFERENCED_ROW: u16 = 1452;

const CHILD_ROW_PREFIX: &str = "Cannot add or update a child row: a foreign key constraint fails";
const PARENT_ROW_PREFIX: &str = "Cannot delete or update a parent row: a foreign key constraint fails";

static QUOTED_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").expect("static pattern"));

static DUPLICATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^Duplicate entry `(.*)` for key `([^`]*)`$").expect("static pattern"));

/// The engine's own duplicate-entry wording, single-quoted and with a table-qualified key.
static NATIVE_DUPLICATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^Duplicate entry '(.*)' for key '([^']*)'$").expect("static pattern"));

/// An engine error reduced to its number and message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Error {number}: {message}")]
pub struct EngineError {
    pub number: u16,
    pub message: String,
}

impl EngineError {
    pub fn new(number: u16, message: impl Into<String>) -> Self {
        Self {
            number,
            message: message.into(),
        }
    }
}

fn quoted_tokens(message: &str) -> Vec<&str> {
    QUOTED_TOKEN
        .captures_iter(message)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// A unique-key violation: the offending `entry` collided on index `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub key: String,
    pub entry: String,
}

impl DuplicateEntry {
    pub fn new(key: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry: entry.into(),
        }
    }

    /// The error the engine would raise for this violation.
    pub fn generate(&self) -> EngineError {
        EngineError::new(ER_DUP_ENTRY, format!("Duplicate entry `{}` for key `{}`", self.entry, self.key))
    }

    pub fn parse(raw: &EngineError) -> Option<Self> {
        if raw.number != ER_DUP_ENTRY {
            return None;
        }

        if let Some(caps) = DUPLICATE.captures(&raw.message) {
            return Some(Self::new(caps.get(2)?.as_str(), caps.get(1)?.as_str()));
        }

        let caps = NATIVE_DUPLICATE.captures(&raw.message)?;
        let entry = caps.get(1)?.as_str();
        let key = caps.get(2)?.as_str();
        // Newer servers qualify the index with its table: 'student_auths.student_id'.
        let key = key.rsplit_once('.').map_or(key, |(_, k)| k);
        Some(Self::new(key, entry))
    }
}

impl fmt::Display for DuplicateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate entry {:?} for key {:?}", self.entry, self.key)
    }
}

/// The referencing side of a foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FkInfo {
    pub db: String,
    pub table: String,
    pub constraint: String,
    pub attribute: String,
}

/// The referenced side of a foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefInfo {
    pub table: String,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyConstraintFail {
    pub fk: FkInfo,
    pub reference: RefInfo,
}

impl ForeignKeyConstraintFail {
    pub fn new(fk: FkInfo, reference: RefInfo) -> Self {
        Self { fk, reference }
    }

    fn message(&self, prefix: &str) -> String {
        format!(
            "{prefix} (`{}`.`{}`, CONSTRAINT `{}` FOREIGN KEY (`{}`) REFERENCES `{}` (`{}`))",
            self.fk.db, self.fk.table, self.fk.constraint, self.fk.attribute, self.reference.table, self.reference.attribute
        )
    }

    /// The error raised when a child row points at a parent that does not exist.
    pub fn generate(&self) -> EngineError {
        EngineError::new(ER_NO_REFERENCED_ROW, self.message(CHILD_ROW_PREFIX))
    }

    /// The error raised when removing a parent row that is still referenced.
    pub fn generate_referenced(&self) -> EngineError {
        EngineError::new(ER_ROW_IS_REFERENCED, self.message(PARENT_ROW_PREFIX))
    }

    pub fn parse(raw: &EngineError) -> Option<Self> {
        if raw.number != ER_NO_REFERENCED_ROW && raw.number != ER_ROW_IS_REFERENCED {
            return None;
        }

        match quoted_tokens(&raw.message)[..] {
            [db, table, constraint, attribute, ref_table, ref_attribute] => Some(Self {
                fk: FkInfo {
                    db: db.to_string(),
                    table: table.to_string(),
                    constraint: constraint.to_string(),
                    attribute: attribute.to_string(),
                },
                reference: RefInfo {
                    table: ref_table.to_string(),
                    attribute: ref_attribute.to_string(),
                },
            }),
            _ => None,
        }
    }

    /// Drop the schema-internal identity (database, table, constraint name), keeping the
    /// violated attribute and what it references.
    pub fn except_reference_inform(&self) -> Self {
        Self {
            fk: FkInfo {
                attribute: self.fk.attribute.clone(),
                ..FkInfo::default()
            },
            reference: self.reference.clone(),
        }
    }
}

impl fmt::Display for ForeignKeyConstraintFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} references missing or protected {}.{}",
            self.fk.table, self.fk.attribute, self.reference.table, self.reference.attribute
        )
    }
}

/// Turn a raw engine error into its typed form, or leave it unclassified.
pub fn classify(raw: EngineError) -> DbError {
    if let Some(dup) = DuplicateEntry::parse(&raw) {
        return DbError::DuplicateEntry(dup);
    }
    if let Some(fk) = ForeignKeyConstraintFail::parse(&raw) {
        return DbError::ForeignKeyConstraintFail(fk);
    }
    tracing::debug!(number = raw.number, "engine error left unclassified");
    DbError::Unclassified(raw)
}

/// Classify a raw foreign-key failure with its schema-internal identity removed.
///
/// Returns the original error unchanged when it is not a parsable foreign-key failure.
pub fn except_reference_inform(raw: EngineError) -> Result<ForeignKeyConstraintFail, EngineError> {
    match ForeignKeyConstraintFail::parse(&raw) {
        Some(fk) => Ok(fk.except_reference_inform()),
        None => Err(raw),
    }
}
