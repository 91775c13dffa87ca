//! Profile records. Each belongs to exactly one credential record of the same role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CompositeKey, Entity, Revision, validate_all};
use crate::db::errors::{DbError, ValidationError};
use crate::db::fields::*;
use crate::db::schema::{self, Table};

/// Duplicate-entry key reported for a taken (grade, class, student number) seat.
pub const STUDENT_SEAT_KEY: &str = "number";
/// Duplicate-entry key reported for a class that already has a homeroom teacher.
pub const TEACHER_CLASS_KEY: &str = "class";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInform {
    pub student_uuid: StudentUuid,
    pub grade: Grade,
    pub class: Class,
    pub student_number: StudentNumber,
    pub name: Name,
    pub phone_number: PhoneNumber,
    pub profile_uri: ProfileUri,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StudentInform {
    /// Seat code as printed on rosters, e.g. grade 2, class 1, number 7 is `2107`.
    pub fn seat(&self) -> String {
        format!("{}{}{:02}", self.grade.0, self.class.0, self.student_number.0)
    }
}

impl Entity for StudentInform {
    type Id = StudentUuid;

    const TABLE: &'static Table = &schema::STUDENT_INFORMS;

    const COMPOSITE_COLUMNS: &'static [&'static str] = &[Grade::KEY, Class::KEY, StudentNumber::KEY];

    fn identity(&self) -> &StudentUuid {
        &self.student_uuid
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[
            &self.student_uuid,
            &self.grade,
            &self.class,
            &self.student_number,
            &self.name,
            &self.phone_number,
            &self.profile_uri,
        ])
    }

    fn to_columns(&self) -> Columns {
        let mut columns = Columns::new();
        put(&mut columns, &self.student_uuid);
        put(&mut columns, &self.grade);
        put(&mut columns, &self.class);
        put(&mut columns, &self.student_number);
        put(&mut columns, &self.name);
        put(&mut columns, &self.phone_number);
        put(&mut columns, &self.profile_uri);
        columns
    }

    fn from_columns(mut columns: Columns) -> Result<Self, DbError> {
        Ok(Self {
            student_uuid: take(&mut columns)?,
            grade: take(&mut columns)?,
            class: take(&mut columns)?,
            student_number: take(&mut columns)?,
            name: take(&mut columns)?,
            phone_number: take(&mut columns)?,
            profile_uri: take(&mut columns)?,
            created_at: take_timestamp(&mut columns, "created_at"),
            updated_at: take_timestamp(&mut columns, "updated_at"),
        })
    }

    fn composite_key(&self) -> Option<CompositeKey> {
        let mut filter = Columns::new();
        put(&mut filter, &self.grade);
        put(&mut filter, &self.class);
        put(&mut filter, &self.student_number);
        Some(CompositeKey {
            key: STUDENT_SEAT_KEY,
            entry: self.seat(),
            filter,
        })
    }
}

/// Sparse change to, or filter over, [`StudentInform`] rows.
///
/// Grade, class and number cannot be cleared: a student always has a seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInformRevision {
    pub student_uuid: Option<StudentUuid>,
    pub grade: Option<Grade>,
    pub class: Option<Class>,
    pub student_number: Option<StudentNumber>,
    pub name: Option<Name>,
    pub phone_number: Option<PhoneNumber>,
    pub profile_uri: Option<ProfileUri>,
}

impl Revision for StudentInformRevision {
    type Target = StudentInform;

    fn identity(&self) -> Option<&StudentUuid> {
        self.student_uuid.as_ref()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[
            &self.student_uuid,
            &self.grade,
            &self.class,
            &self.student_number,
            &self.name,
            &self.phone_number,
            &self.profile_uri,
        ])
    }

    fn payload(&self) -> Columns {
        let mut columns = Columns::new();
        put_supplied(&mut columns, &self.grade);
        put_supplied(&mut columns, &self.class);
        put_supplied(&mut columns, &self.student_number);
        put_supplied(&mut columns, &self.name);
        put_supplied(&mut columns, &self.phone_number);
        put_supplied(&mut columns, &self.profile_uri);
        columns
    }
}

/// A teacher profile. `grade` and `class` stay `None` until a homeroom is assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherInform {
    pub teacher_uuid: TeacherUuid,
    pub grade: Option<Grade>,
    pub class: Option<Class>,
    pub name: Name,
    pub phone_number: PhoneNumber,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for TeacherInform {
    type Id = TeacherUuid;

    const TABLE: &'static Table = &schema::TEACHER_INFORMS;

    const COMPOSITE_COLUMNS: &'static [&'static str] = &[Grade::KEY, Class::KEY];

    fn identity(&self) -> &TeacherUuid {
        &self.teacher_uuid
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[&self.teacher_uuid, &self.grade, &self.class, &self.name, &self.phone_number])
    }

    fn to_columns(&self) -> Columns {
        let mut columns = Columns::new();
        put(&mut columns, &self.teacher_uuid);
        put(&mut columns, &self.grade);
        put(&mut columns, &self.class);
        put(&mut columns, &self.name);
        put(&mut columns, &self.phone_number);
        columns
    }

    fn from_columns(mut columns: Columns) -> Result<Self, DbError> {
        Ok(Self {
            teacher_uuid: take(&mut columns)?,
            grade: take(&mut columns)?,
            class: take(&mut columns)?,
            name: take(&mut columns)?,
            phone_number: take(&mut columns)?,
            created_at: take_timestamp(&mut columns, "created_at"),
            updated_at: take_timestamp(&mut columns, "updated_at"),
        })
    }

    fn composite_key(&self) -> Option<CompositeKey> {
        let (grade, class) = (self.grade?, self.class?);
        let mut filter = Columns::new();
        put(&mut filter, &grade);
        put(&mut filter, &class);
        Some(CompositeKey {
            key: TEACHER_CLASS_KEY,
            entry: format!("{}{}", grade.0, class.0),
            filter,
        })
    }
}

/// Sparse change to, or filter over, [`TeacherInform`] rows.
///
/// Supplying `Grade(0)` or `Class(0)` clears the homeroom column to `NULL`; as a filter it
/// selects teachers without one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherInformRevision {
    pub teacher_uuid: Option<TeacherUuid>,
    pub grade: Option<Grade>,
    pub class: Option<Class>,
    pub name: Option<Name>,
    pub phone_number: Option<PhoneNumber>,
}

impl Revision for TeacherInformRevision {
    type Target = TeacherInform;

    fn identity(&self) -> Option<&TeacherUuid> {
        self.teacher_uuid.as_ref()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let grade = self.grade.filter(|g| !g.is_zero());
        let class = self.class.filter(|c| !c.is_zero());
        validate_all(&[&self.teacher_uuid, &grade, &class, &self.name, &self.phone_number])
    }

    fn payload(&self) -> Columns {
        let mut columns = Columns::new();
        put_supplied(&mut columns, &self.grade);
        put_supplied(&mut columns, &self.class);
        put_supplied(&mut columns, &self.name);
        put_supplied(&mut columns, &self.phone_number);
        columns
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInform {
    pub parent_uuid: ParentUuid,
    pub name: Name,
    pub phone_number: PhoneNumber,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for ParentInform {
    type Id = ParentUuid;

    const TABLE: &'static Table = &schema::PARENT_INFORMS;

    fn identity(&self) -> &ParentUuid {
        &self.parent_uuid
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[&self.parent_uuid, &self.name, &self.phone_number])
    }

    fn to_columns(&self) -> Columns {
        let mut columns = Columns::new();
        put(&mut columns, &self.parent_uuid);
        put(&mut columns, &self.name);
        put(&mut columns, &self.phone_number);
        columns
    }

    fn from_columns(mut columns: Columns) -> Result<Self, DbError> {
        Ok(Self {
            parent_uuid: take(&mut columns)?,
            name: take(&mut columns)?,
            phone_number: take(&mut columns)?,
            created_at: take_timestamp(&mut columns, "created_at"),
            updated_at: take_timestamp(&mut columns, "updated_at"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInformRevision {
    pub parent_uuid: Option<ParentUuid>,
    pub name: Option<Name>,
    pub phone_number: Option<PhoneNumber>,
}

impl Revision for ParentInformRevision {
    type Target = ParentInform;

    fn identity(&self) -> Option<&ParentUuid> {
        self.parent_uuid.as_ref()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[&self.parent_uuid, &self.name, &self.phone_number])
    }

    fn payload(&self) -> Columns {
        let mut columns = Columns::new();
        put_supplied(&mut columns, &self.name);
        put_supplied(&mut columns, &self.phone_number);
        columns
    }
}
