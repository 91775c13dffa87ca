//! Typed wrappers for every stored attribute.
//!
//! Each wrapper knows the column it is stored in ([`FieldValue::KEY`]) and how its value
//! maps to SQL. For the nullable columns (`grade`, `class`, `student_number`,
//! `parent_uuid`) the wrapper's zero value maps to `NULL`; every other wrapper stores its
//! zero value literally. This is what lets revisions and filters be turned into column
//! maps generically, see [`put`] and [`put_supplied`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::db::errors::{DbError, ValidationError};

/// A single SQL value as it crosses the backend boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Column name to value, in column-name order.
pub type Columns = BTreeMap<&'static str, Value>;

pub trait FieldValue: Sized {
    /// Column this value is stored in.
    const KEY: &'static str;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, DbError>;

    /// Whether this is the type's zero value.
    fn is_zero(&self) -> bool;
}

/// Self-check against the domain rules for the attribute.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl<F: FieldValue> FieldValue for Option<F> {
    const KEY: &'static str = F::KEY;

    fn to_value(&self) -> Value {
        match self {
            Some(f) => f.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(F::from_value(other)?).filter(|f| !f.is_zero())),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<F: Validate> Validate for Option<F> {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Some(f) => f.validate(),
            None => Ok(()),
        }
    }
}

/// Insert `field` under its own key.
pub fn put<F: FieldValue>(columns: &mut Columns, field: &F) {
    columns.insert(F::KEY, field.to_value());
}

/// Insert `field` only if the caller supplied it.
pub fn put_supplied<F: FieldValue>(columns: &mut Columns, field: &Option<F>) {
    if let Some(f) = field {
        columns.insert(F::KEY, f.to_value());
    }
}

/// Remove and decode the column for `F`; a missing column decodes as `NULL`.
pub fn take<F: FieldValue>(columns: &mut Columns) -> Result<F, DbError> {
    F::from_value(columns.remove(F::KEY).unwrap_or(Value::Null))
}

pub fn take_timestamp(columns: &mut Columns, key: &'static str) -> Option<DateTime<Utc>> {
    match columns.remove(key) {
        Some(Value::Timestamp(t)) => Some(t),
        _ => None,
    }
}

fn decode_error(key: &'static str, expected: &str, got: &Value) -> DbError {
    DbError::Other(anyhow::anyhow!("column {key}: expected {expected}, got {got:?}"))
}

macro_rules! text_field {
    ($(#[$meta:meta])* $name:ident, $key:literal, nullable) => {
        text_field!(@define $(#[$meta])* $name, $key, true);
    };
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        text_field!(@define $(#[$meta])* $name, $key, false);
    };
    (@define $(#[$meta:meta])* $name:ident, $key:literal, $nullable:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FieldValue for $name {
            const KEY: &'static str = $key;

            fn to_value(&self) -> Value {
                if $nullable && self.0.is_empty() {
                    Value::Null
                } else {
                    Value::Text(self.0.clone())
                }
            }

            fn from_value(value: Value) -> Result<Self, DbError> {
                match value {
                    Value::Text(s) => Ok(Self(s)),
                    Value::Null => Ok(Self::default()),
                    other => Err(decode_error($key, "text", &other)),
                }
            }

            fn is_zero(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

macro_rules! int_field {
    ($(#[$meta:meta])* $name:ident, $key:literal, $min:literal ..= $max:literal) => {
        $(#[$meta])*
        ///
        /// Nullable: the zero value is stored as `NULL`.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u8);

        impl FieldValue for $name {
            const KEY: &'static str = $key;

            fn to_value(&self) -> Value {
                if self.0 == 0 { Value::Null } else { Value::Int(i64::from(self.0)) }
            }

            fn from_value(value: Value) -> Result<Self, DbError> {
                match value {
                    Value::Null => Ok(Self(0)),
                    Value::Int(i) => u8::try_from(i).map(Self).map_err(|_| decode_error($key, "small integer", &Value::Int(i))),
                    other => Err(decode_error($key, "integer", &other)),
                }
            }

            fn is_zero(&self) -> bool {
                self.0 == 0
            }
        }

        impl Validate for $name {
            fn validate(&self) -> Result<(), ValidationError> {
                if ($min..=$max).contains(&self.0) {
                    Ok(())
                } else {
                    Err(ValidationError::OutOfRange {
                        field: $key,
                        value: i64::from(self.0),
                        min: $min,
                        max: $max,
                    })
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

text_field!(
    /// Identity of a student account, `student-` followed by 12 digits.
    StudentUuid,
    "student_uuid"
);
text_field!(
    /// Identity of a teacher account, `teacher-` followed by 12 digits.
    TeacherUuid,
    "teacher_uuid"
);
text_field!(
    /// Identity of a parent account, `parent-` followed by 12 digits.
    ///
    /// Also the student's reference to its parent, where an empty value is stored as `NULL`.
    ParentUuid,
    "parent_uuid",
    nullable
);
text_field!(
    /// Identity of an administrator account, `admin-` followed by 12 digits.
    AdminUuid,
    "admin_uuid"
);

text_field!(StudentId, "student_id");
text_field!(TeacherId, "teacher_id");
text_field!(ParentId, "parent_id");
text_field!(AdminId, "admin_id");

text_field!(
    /// Password hash as produced by the hashing collaborator. Never a plain password.
    StudentPw,
    "student_pw"
);
text_field!(TeacherPw, "teacher_pw");
text_field!(ParentPw, "parent_pw");
text_field!(AdminPw, "admin_pw");

text_field!(Name, "name");
text_field!(PhoneNumber, "phone_number");
text_field!(
    /// Location of the student's profile image.
    ProfileUri,
    "profile_uri"
);

int_field!(Grade, "grade", 1..=3);
int_field!(
    /// Class within a grade.
    Class,
    "class",
    1..=4
);
int_field!(
    /// Seat number within a class.
    StudentNumber,
    "student_number",
    1..=21
);

const UUID_DIGITS: usize = 12;
const LOGIN_ID_LEN: (usize, usize) = (4, 20);
const HASH_MAX_LEN: usize = 255;
const NAME_LEN: (usize, usize) = (2, 4);
const PHONE_DIGITS: usize = 11;
const URI_MAX_LEN: usize = 255;

fn validate_uuid(field: &'static str, prefix: &'static str, value: &str) -> Result<(), ValidationError> {
    let well_formed = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|digits| digits.len() == UUID_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()));

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::MalformedUuid {
            field,
            prefix,
            value: value.to_string(),
        })
    }
}

fn validate_len(field: &'static str, len: usize, (min, max): (usize, usize)) -> Result<(), ValidationError> {
    if len < min || len > max {
        return Err(ValidationError::Length { field, len, min, max });
    }
    Ok(())
}

fn validate_login_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !value.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ValidationError::Charset { field });
    }
    validate_len(field, value.len(), LOGIN_ID_LEN)
}

fn validate_hash(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    validate_len(field, value.len(), (1, HASH_MAX_LEN))
}

macro_rules! impl_validate {
    ($name:ident, |$v:ident| $body:expr) => {
        impl Validate for $name {
            fn validate(&self) -> Result<(), ValidationError> {
                let $v = self.0.as_str();
                $body
            }
        }
    };
}

impl_validate!(StudentUuid, |v| validate_uuid(Self::KEY, "student", v));
impl_validate!(TeacherUuid, |v| validate_uuid(Self::KEY, "teacher", v));
impl_validate!(ParentUuid, |v| validate_uuid(Self::KEY, "parent", v));
impl_validate!(AdminUuid, |v| validate_uuid(Self::KEY, "admin", v));

impl_validate!(StudentId, |v| validate_login_id(Self::KEY, v));
impl_validate!(TeacherId, |v| validate_login_id(Self::KEY, v));
impl_validate!(ParentId, |v| validate_login_id(Self::KEY, v));
impl_validate!(AdminId, |v| validate_login_id(Self::KEY, v));

impl_validate!(StudentPw, |v| validate_hash(Self::KEY, v));
impl_validate!(TeacherPw, |v| validate_hash(Self::KEY, v));
impl_validate!(ParentPw, |v| validate_hash(Self::KEY, v));
impl_validate!(AdminPw, |v| validate_hash(Self::KEY, v));

impl_validate!(Name, |v| validate_len(Self::KEY, v.chars().count(), NAME_LEN));

impl_validate!(PhoneNumber, |v| {
    if v.len() == PHONE_DIGITS && v.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::Digits {
            field: Self::KEY,
            digits: PHONE_DIGITS,
        })
    }
});

impl_validate!(ProfileUri, |v| {
    if v.is_empty() {
        return Err(ValidationError::Missing { field: Self::KEY });
    }
    // Backticks delimit tokens in engine error text.
    if !v.bytes().all(|b| b.is_ascii_graphic() && b != b'`') {
        return Err(ValidationError::Charset { field: Self::KEY });
    }
    validate_len(Self::KEY, v.len(), (1, URI_MAX_LEN))
});
