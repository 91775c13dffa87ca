//! Credential records, one table per role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthEntity, Entity, Revision, validate_all};
use crate::db::errors::{DbError, ValidationError};
use crate::db::fields::*;
use crate::db::schema::{self, Table};

/// Student credentials, optionally linked to the parent account that owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAuth {
    pub uuid: StudentUuid,
    pub student_id: StudentId,
    pub student_pw: StudentPw,
    pub parent_uuid: Option<ParentUuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for StudentAuth {
    type Id = StudentUuid;

    const TABLE: &'static Table = &schema::STUDENT_AUTHS;

    fn identity(&self) -> &StudentUuid {
        &self.uuid
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_all(&[&self.uuid, &self.student_id, &self.student_pw, &self.parent_uuid])
    }

    fn to_columns(&self) -> Columns {
        let mut columns = Columns::new();
        put(&mut columns, &self.uuid);
        put(&mut columns, &self.student_id);
        put(&mut columns, &self.student_pw);
        put(&mut columns, &self.parent_uuid);
        columns
    }

    fn from_columns(mut columns: Columns) -> Result<Self, DbError> {
        Ok(Self {
            uuid: take(&mut columns)?,
            student_id: take(&mut columns)?,
            student_pw: take(&mut columns)?,
            parent_uuid: take(&mut columns)?,
            created_at: take_timestamp(&mut columns, "created_at"),
            updated_at: take_timestamp(&mut columns, "updated_at"),
        })
    }
}

impl AuthEntity for StudentAuth {
    type LoginId = StudentId;
}

/// Sparse change to a [`StudentAuth`].
///
/// `parent_uuid: Some(ParentUuid::default())` unlinks the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAuthRevision {
    pub uuid: Option<StudentUuid>,
    pub student_id: Option<StudentId>,
    pub student_pw: Option<StudentPw>,
    pub parent_uuid: Option<ParentUuid>,
}

impl Revision for StudentAuthRevision {
    type Target = StudentAuth;

    fn identity(&self) -> Option<&StudentUuid> {
        self.uuid.as_ref()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let parent = self.parent_uuid.clone().filter(|p| !p.is_zero());
        validate_all(&[&self.uuid, &self.student_id, &self.student_pw, &parent])
    }

    fn payload(&self) -> Columns {
        let mut columns = Columns::new();
        put_supplied(&mut columns, &self.student_id);
        put_supplied(&mut columns, &self.student_pw);
        put_supplied(&mut columns, &self.parent_uuid);
        columns
    }
}

/// Credential records for the roles without extra columns.
macro_rules! plain_auth {
    ($(#[$meta:meta])* $entity:ident, $revision:ident, $table:path, $uuid:ident, $id:ident, $pw:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $entity {
            pub uuid: $uuid,
            pub login_id: $id,
            pub password: $pw,
            pub created_at: Option<DateTime<Utc>>,
            pub updated_at: Option<DateTime<Utc>>,
        }

        impl Entity for $entity {
            type Id = $uuid;

            const TABLE: &'static Table = &$table;

            fn identity(&self) -> &$uuid {
                &self.uuid
            }

            fn validate(&self) -> Result<(), ValidationError> {
                validate_all(&[&self.uuid, &self.login_id, &self.password])
            }

            fn to_columns(&self) -> Columns {
                let mut columns = Columns::new();
                put(&mut columns, &self.uuid);
                put(&mut columns, &self.login_id);
                put(&mut columns, &self.password);
                columns
            }

            fn from_columns(mut columns: Columns) -> Result<Self, DbError> {
                Ok(Self {
                    uuid: take(&mut columns)?,
                    login_id: take(&mut columns)?,
                    password: take(&mut columns)?,
                    created_at: take_timestamp(&mut columns, "created_at"),
                    updated_at: take_timestamp(&mut columns, "updated_at"),
                })
            }
        }

        impl AuthEntity for $entity {
            type LoginId = $id;
        }

        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $revision {
            pub uuid: Option<$uuid>,
            pub login_id: Option<$id>,
            pub password: Option<$pw>,
        }

        impl Revision for $revision {
            type Target = $entity;

            fn identity(&self) -> Option<&$uuid> {
                self.uuid.as_ref()
            }

            fn validate(&self) -> Result<(), ValidationError> {
                validate_all(&[&self.uuid, &self.login_id, &self.password])
            }

            fn payload(&self) -> Columns {
                let mut columns = Columns::new();
                put_supplied(&mut columns, &self.login_id);
                put_supplied(&mut columns, &self.password);
                columns
            }
        }
    };
}

plain_auth!(
    /// Teacher credentials.
    TeacherAuth,
    TeacherAuthRevision,
    schema::TEACHER_AUTHS,
    TeacherUuid,
    TeacherId,
    TeacherPw
);
plain_auth!(
    /// Parent credentials. Students reference these through `parent_uuid`.
    ParentAuth,
    ParentAuthRevision,
    schema::PARENT_AUTHS,
    ParentUuid,
    ParentId,
    ParentPw
);
plain_auth!(
    /// Administrator credentials.
    AdminAuth,
    AdminAuthRevision,
    schema::ADMIN_AUTHS,
    AdminUuid,
    AdminId,
    AdminPw
);
