//! Transaction-bound account operations.

use tracing::instrument;

use crate::db::backends::TxHandle;
use crate::db::classify::DuplicateEntry;
use crate::db::errors::{DbError, Result};
use crate::db::fields::*;
use crate::db::models::auth::*;
use crate::db::models::inform::*;
use crate::db::models::{AuthEntity, CompositeKey, Entity, Revision};

/// Exclusive owner of one open transaction.
///
/// Every request gets its own accessor from an
/// [`AccessorFactory`](crate::db::handlers::AccessorFactory). Operations run strictly in
/// sequence on the underlying transaction; nothing is visible to other accessors until
/// [`Accessor::commit`]. Both `commit` and `rollback` consume the accessor.
///
/// Update and delete are idempotent: targeting a uuid that does not exist succeeds without
/// touching any row.
pub struct Accessor<T> {
    tx: T,
}

impl<T: TxHandle> Accessor<T> {
    pub fn new(tx: T) -> Self {
        Self { tx }
    }

    #[instrument(skip(self), err)]
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await
    }

    #[instrument(skip(self), err)]
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await
    }

    async fn find_one<E: Entity>(&mut self, filter: &Columns) -> Result<E> {
        let row = self.tx.select(E::TABLE, filter).await?.into_iter().next().ok_or(DbError::NotFound)?;
        E::from_columns(row)
    }

    /// Look a row up by any single validated field.
    async fn find_by<E: Entity, F: FieldValue + Validate>(&mut self, field: &F) -> Result<E> {
        field.validate()?;
        let mut filter = Columns::new();
        put(&mut filter, field);
        self.find_one(&filter).await
    }

    /// Fail with a duplicate entry if any row other than `owner` already holds `key`.
    async fn ensure_vacant<E: Entity>(&mut self, key: &CompositeKey, owner: Option<&Value>) -> Result<()> {
        let identity = E::TABLE.identity;
        let rows = self.tx.select(E::TABLE, &key.filter).await?;
        let taken = rows.iter().any(|row| owner.is_none_or(|id| row.get(identity) != Some(id)));
        if taken {
            return Err(DbError::DuplicateEntry(DuplicateEntry::new(key.key, key.entry.clone())));
        }
        Ok(())
    }

    async fn create<E: Entity>(&mut self, entity: &E) -> Result<E> {
        entity.validate()?;
        if let Some(key) = entity.composite_key() {
            self.ensure_vacant::<E>(&key, None).await?;
        }
        self.tx.insert(E::TABLE, entity.to_columns()).await?;
        self.find_by(entity.identity()).await
    }

    async fn uuids_matching<R: Revision>(&mut self, filter: &R) -> Result<Vec<<R::Target as Entity>::Id>> {
        filter.validate()?;
        let table = <R::Target as Entity>::TABLE;
        let rows = self.tx.select(table, &filter.criteria()).await?;
        if rows.is_empty() {
            return Err(DbError::NotFound);
        }
        rows.into_iter()
            .map(|mut row| <<R::Target as Entity>::Id as FieldValue>::from_value(row.remove(table.identity).unwrap_or(Value::Null)))
            .collect()
    }

    async fn modify<R: Revision>(&mut self, uuid: &<R::Target as Entity>::Id, revision: &R) -> Result<()> {
        if revision.identity().is_some() {
            return Err(DbError::IdentityImmutable {
                field: <<R::Target as Entity>::Id as FieldValue>::KEY,
            });
        }
        uuid.validate()?;
        revision.validate()?;

        let payload = revision.payload();
        if payload.is_empty() {
            tracing::debug!(%uuid, "revision carries no fields, nothing to modify");
            return Ok(());
        }

        let mut filter = Columns::new();
        put(&mut filter, uuid);

        let touches_composite = payload.keys().any(|k| <R::Target as Entity>::COMPOSITE_COLUMNS.contains(k));
        if touches_composite {
            let current = match self.find_one::<R::Target>(&filter).await {
                Ok(current) => current,
                Err(DbError::NotFound) => {
                    tracing::debug!(%uuid, "no row to modify");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let mut merged = current.to_columns();
            merged.extend(payload.clone());
            if let Some(key) = <R::Target as Entity>::from_columns(merged)?.composite_key() {
                self.ensure_vacant::<R::Target>(&key, Some(&uuid.to_value())).await?;
            }
        }

        let affected = self.tx.update(<R::Target as Entity>::TABLE, &filter, &payload).await?;
        if affected == 0 {
            tracing::debug!(%uuid, "no row changed");
        }
        Ok(())
    }

    async fn delete<E: Entity>(&mut self, uuid: &E::Id) -> Result<()> {
        uuid.validate()?;
        let mut filter = Columns::new();
        put(&mut filter, uuid);
        if self.tx.delete(E::TABLE, &filter).await? == 0 {
            tracing::debug!(%uuid, "no row to delete");
        }
        Ok(())
    }

    async fn auth_with_id<E: AuthEntity>(&mut self, login_id: &E::LoginId) -> Result<E> {
        self.find_by(login_id).await
    }

    // Students

    #[instrument(skip(self, auth), fields(uuid = %auth.uuid), err)]
    pub async fn create_student_auth(&mut self, auth: &StudentAuth) -> Result<StudentAuth> {
        self.create(auth).await
    }

    #[instrument(skip(self, inform), fields(uuid = %inform.student_uuid), err)]
    pub async fn create_student_inform(&mut self, inform: &StudentInform) -> Result<StudentInform> {
        self.create(inform).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_student_auth_with_id(&mut self, student_id: &StudentId) -> Result<StudentAuth> {
        self.auth_with_id::<StudentAuth>(student_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_student_auth_with_uuid(&mut self, uuid: &StudentUuid) -> Result<StudentAuth> {
        self.find_by(uuid).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_student_inform_with_uuid(&mut self, uuid: &StudentUuid) -> Result<StudentInform> {
        self.find_by(uuid).await
    }

    /// Uuids of every student whose profile matches all supplied fields of `filter`.
    #[instrument(skip(self, filter), err)]
    pub async fn get_student_uuids_with_inform(&mut self, filter: &StudentInformRevision) -> Result<Vec<StudentUuid>> {
        self.uuids_matching(filter).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_student_inform(&mut self, uuid: &StudentUuid, revision: &StudentInformRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_student_auth(&mut self, uuid: &StudentUuid, revision: &StudentAuthRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_student_auth(&mut self, uuid: &StudentUuid) -> Result<()> {
        self.delete::<StudentAuth>(uuid).await
    }

    // Teachers

    #[instrument(skip(self, auth), fields(uuid = %auth.uuid), err)]
    pub async fn create_teacher_auth(&mut self, auth: &TeacherAuth) -> Result<TeacherAuth> {
        self.create(auth).await
    }

    #[instrument(skip(self, inform), fields(uuid = %inform.teacher_uuid), err)]
    pub async fn create_teacher_inform(&mut self, inform: &TeacherInform) -> Result<TeacherInform> {
        self.create(inform).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_teacher_auth_with_id(&mut self, teacher_id: &TeacherId) -> Result<TeacherAuth> {
        self.auth_with_id::<TeacherAuth>(teacher_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_teacher_auth_with_uuid(&mut self, uuid: &TeacherUuid) -> Result<TeacherAuth> {
        self.find_by(uuid).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_teacher_inform_with_uuid(&mut self, uuid: &TeacherUuid) -> Result<TeacherInform> {
        self.find_by(uuid).await
    }

    /// `Grade(0)` or `Class(0)` in the filter selects teachers without a homeroom.
    #[instrument(skip(self, filter), err)]
    pub async fn get_teacher_uuids_with_inform(&mut self, filter: &TeacherInformRevision) -> Result<Vec<TeacherUuid>> {
        self.uuids_matching(filter).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_teacher_inform(&mut self, uuid: &TeacherUuid, revision: &TeacherInformRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_teacher_auth(&mut self, uuid: &TeacherUuid, revision: &TeacherAuthRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_teacher_auth(&mut self, uuid: &TeacherUuid) -> Result<()> {
        self.delete::<TeacherAuth>(uuid).await
    }

    // Parents

    #[instrument(skip(self, auth), fields(uuid = %auth.uuid), err)]
    pub async fn create_parent_auth(&mut self, auth: &ParentAuth) -> Result<ParentAuth> {
        self.create(auth).await
    }

    #[instrument(skip(self, inform), fields(uuid = %inform.parent_uuid), err)]
    pub async fn create_parent_inform(&mut self, inform: &ParentInform) -> Result<ParentInform> {
        self.create(inform).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_parent_auth_with_id(&mut self, parent_id: &ParentId) -> Result<ParentAuth> {
        self.auth_with_id::<ParentAuth>(parent_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_parent_auth_with_uuid(&mut self, uuid: &ParentUuid) -> Result<ParentAuth> {
        self.find_by(uuid).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_parent_inform_with_uuid(&mut self, uuid: &ParentUuid) -> Result<ParentInform> {
        self.find_by(uuid).await
    }

    #[instrument(skip(self, filter), err)]
    pub async fn get_parent_uuids_with_inform(&mut self, filter: &ParentInformRevision) -> Result<Vec<ParentUuid>> {
        self.uuids_matching(filter).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_parent_inform(&mut self, uuid: &ParentUuid, revision: &ParentInformRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_parent_auth(&mut self, uuid: &ParentUuid, revision: &ParentAuthRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    /// Fails with a classified foreign-key error while a student or profile still refers to
    /// the parent.
    #[instrument(skip(self), err)]
    pub async fn delete_parent_auth(&mut self, uuid: &ParentUuid) -> Result<()> {
        self.delete::<ParentAuth>(uuid).await
    }

    // Administrators

    #[instrument(skip(self, auth), fields(uuid = %auth.uuid), err)]
    pub async fn create_admin_auth(&mut self, auth: &AdminAuth) -> Result<AdminAuth> {
        self.create(auth).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_admin_auth_with_id(&mut self, admin_id: &AdminId) -> Result<AdminAuth> {
        self.auth_with_id::<AdminAuth>(admin_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_admin_auth_with_uuid(&mut self, uuid: &AdminUuid) -> Result<AdminAuth> {
        self.find_by(uuid).await
    }

    #[instrument(skip(self, revision), err)]
    pub async fn modify_admin_auth(&mut self, uuid: &AdminUuid, revision: &AdminAuthRevision) -> Result<()> {
        self.modify(uuid, revision).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_admin_auth(&mut self, uuid: &AdminUuid) -> Result<()> {
        self.delete::<AdminAuth>(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::backends::{MemoryStore, MemoryTx};
    use crate::db::errors::ValidationError;
    use crate::db::handlers::AccessorFactory;
    use crate::db::schema::{PARENT_AUTHS, STUDENT_AUTHS, STUDENT_INFORMS, TEACHER_INFORMS};
    use proptest::option;
    use proptest::prelude::{Just, Strategy, prop_assert_eq, proptest};

    const PARENT: &str = "parent-000000000001";
    const STUDENT: &str = "student-000000000001";
    const TEACHER: &str = "teacher-000000000001";

    fn parent_auth(uuid: &str, login: &str) -> ParentAuth {
        ParentAuth {
            uuid: ParentUuid::from(uuid),
            login_id: ParentId::from(login),
            password: ParentPw::from("hash"),
            ..Default::default()
        }
    }

    fn student_auth(uuid: &str, login: &str, parent: Option<&str>) -> StudentAuth {
        StudentAuth {
            uuid: StudentUuid::from(uuid),
            student_id: StudentId::from(login),
            student_pw: StudentPw::from("hash"),
            parent_uuid: parent.map(ParentUuid::from),
            ..Default::default()
        }
    }

    fn teacher_auth(uuid: &str, login: &str) -> TeacherAuth {
        TeacherAuth {
            uuid: TeacherUuid::from(uuid),
            login_id: TeacherId::from(login),
            password: TeacherPw::from("hash"),
            ..Default::default()
        }
    }

    fn student_inform(uuid: &str, seat: (u8, u8, u8), phone: &str) -> StudentInform {
        StudentInform {
            student_uuid: StudentUuid::from(uuid),
            grade: Grade(seat.0),
            class: Class(seat.1),
            student_number: StudentNumber(seat.2),
            name: Name::from("박진홍"),
            phone_number: PhoneNumber::from(phone),
            profile_uri: ProfileUri::from(format!("profiles/{uuid}.png").as_str()),
            ..Default::default()
        }
    }

    fn teacher_inform(uuid: &str, homeroom: Option<(u8, u8)>, phone: &str) -> TeacherInform {
        TeacherInform {
            teacher_uuid: TeacherUuid::from(uuid),
            grade: homeroom.map(|(g, _)| Grade(g)),
            class: homeroom.map(|(_, c)| Class(c)),
            name: Name::from("김선생"),
            phone_number: PhoneNumber::from(phone),
            ..Default::default()
        }
    }

    /// A store holding one parent with one linked student who has a profile at seat 2-1-07.
    async fn seeded() -> (MemoryStore, Accessor<MemoryTx>) {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();
        accessor.create_parent_auth(&parent_auth(PARENT, "parent1")).await.unwrap();
        accessor
            .create_student_auth(&student_auth(STUDENT, "student1", Some(PARENT)))
            .await
            .unwrap();
        accessor
            .create_student_inform(&student_inform(STUDENT, (2, 1, 7), "01000000001"))
            .await
            .unwrap();
        accessor.commit().await.unwrap();
        (store.clone(), store.begin_tx().await.unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn test_create_returns_persisted_row() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();

        let created = accessor.create_parent_auth(&parent_auth(PARENT, "parent1")).await.unwrap();
        assert_eq!(created.uuid.as_str(), PARENT);
        assert!(created.created_at.is_some());
        assert!(created.updated_at.is_some());

        let by_id = accessor.get_parent_auth_with_id(&ParentId::from("parent1")).await.unwrap();
        let by_uuid = accessor.get_parent_auth_with_uuid(&ParentUuid::from(PARENT)).await.unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_uuid, created);
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_input_never_reaches_storage() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();

        let err = accessor
            .create_parent_auth(&parent_auth("parent-1", "parent1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::MalformedUuid { .. })));

        let err = accessor
            .get_student_auth_with_id(&StudentId::from("no"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        accessor.commit().await.unwrap();
        assert_eq!(store.row_count(&PARENT_AUTHS), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_rows_are_not_found() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();

        let err = accessor
            .get_admin_auth_with_uuid(&AdminUuid::from("admin-000000000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));

        let err = accessor
            .get_teacher_inform_with_uuid(&TeacherUuid::from(TEACHER))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[test_log::test(tokio::test)]
    async fn test_student_parent_reference_is_enforced() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();

        match accessor
            .create_student_auth(&student_auth(STUDENT, "student1", Some(PARENT)))
            .await
        {
            Err(DbError::ForeignKeyConstraintFail(fk)) => {
                assert_eq!(fk.reference.table, "parent_auths");
                assert_eq!(fk.reference.attribute, "parent_uuid");
            }
            other => panic!("expected foreign key failure, got {other:?}"),
        }

        accessor.create_parent_auth(&parent_auth(PARENT, "parent1")).await.unwrap();
        let student = accessor
            .create_student_auth(&student_auth(STUDENT, "student1", Some(PARENT)))
            .await
            .unwrap();
        assert_eq!(student.parent_uuid, Some(ParentUuid::from(PARENT)));
    }

    #[test_log::test(tokio::test)]
    async fn test_inform_requires_its_auth_row() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();

        let err = accessor
            .create_teacher_inform(&teacher_inform(TEACHER, None, "01000000009"))
            .await
            .unwrap_err();
        match err {
            DbError::ForeignKeyConstraintFail(fk) => assert_eq!(fk.reference.table, "teacher_auths"),
            other => panic!("expected foreign key failure, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicate_login_and_phone() {
        let (_store, mut accessor) = seeded().await;

        match accessor
            .create_student_auth(&student_auth("student-000000000002", "student1", None))
            .await
        {
            Err(DbError::DuplicateEntry(dup)) => {
                assert_eq!(dup.key, "student_id");
                assert_eq!(dup.entry, "student1");
            }
            other => panic!("expected duplicate entry, got {other:?}"),
        }

        accessor
            .create_student_auth(&student_auth("student-000000000002", "student2", None))
            .await
            .unwrap();
        match accessor
            .create_student_inform(&student_inform("student-000000000002", (1, 1, 1), "01000000001"))
            .await
        {
            Err(DbError::DuplicateEntry(dup)) => assert_eq!(dup.key, "phone_number"),
            other => panic!("expected duplicate entry, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_student_seat_is_unique() {
        let (store, mut accessor) = seeded().await;
        accessor
            .create_student_auth(&student_auth("student-000000000002", "student2", None))
            .await
            .unwrap();

        let err = accessor
            .create_student_inform(&student_inform("student-000000000002", (2, 1, 7), "01000000002"))
            .await
            .unwrap_err();
        match err {
            DbError::DuplicateEntry(dup) => {
                assert_eq!(dup.key, "number");
                assert_eq!(dup.entry, "2107");
            }
            other => panic!("expected duplicate entry, got {other:?}"),
        }

        accessor
            .create_student_inform(&student_inform("student-000000000002", (2, 1, 8), "01000000002"))
            .await
            .unwrap();

        // Moving into an occupied seat fails, moving within one's own seat does not.
        let into_taken = StudentInformRevision {
            student_number: Some(StudentNumber(7)),
            ..Default::default()
        };
        let err = accessor
            .modify_student_inform(&StudentUuid::from("student-000000000002"), &into_taken)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateEntry(ref dup) if dup.entry == "2107"));

        let same_seat = StudentInformRevision {
            grade: Some(Grade(2)),
            name: Some(Name::from("이학생")),
            ..Default::default()
        };
        accessor
            .modify_student_inform(&StudentUuid::from(STUDENT), &same_seat)
            .await
            .unwrap();

        accessor.commit().await.unwrap();
        assert_eq!(store.row_count(&STUDENT_INFORMS), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_teacher_homeroom_is_unique_once_assigned() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();
        for (i, login) in ["teacher1", "teacher2", "teacher3"].iter().enumerate() {
            let uuid = format!("teacher-00000000000{}", i + 1);
            accessor.create_teacher_auth(&teacher_auth(&uuid, login)).await.unwrap();
        }

        accessor
            .create_teacher_inform(&teacher_inform("teacher-000000000001", Some((3, 2)), "01000000001"))
            .await
            .unwrap();
        // Unassigned teachers never collide with each other.
        accessor
            .create_teacher_inform(&teacher_inform("teacher-000000000002", None, "01000000002"))
            .await
            .unwrap();
        accessor
            .create_teacher_inform(&teacher_inform("teacher-000000000003", None, "01000000003"))
            .await
            .unwrap();

        let err = accessor
            .create_teacher_inform(&teacher_inform("teacher-000000000004", Some((3, 2)), "01000000004"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateEntry(ref dup) if dup.key == "class" && dup.entry == "32"));

        let assign = TeacherInformRevision {
            grade: Some(Grade(3)),
            class: Some(Class(2)),
            ..Default::default()
        };
        let err = accessor
            .modify_teacher_inform(&TeacherUuid::from("teacher-000000000002"), &assign)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateEntry(ref dup) if dup.entry == "32"));

        // Clearing the first homeroom frees the class.
        let clear = TeacherInformRevision {
            grade: Some(Grade(0)),
            class: Some(Class(0)),
            ..Default::default()
        };
        accessor
            .modify_teacher_inform(&TeacherUuid::from("teacher-000000000001"), &clear)
            .await
            .unwrap();
        accessor
            .modify_teacher_inform(&TeacherUuid::from("teacher-000000000002"), &assign)
            .await
            .unwrap();

        let cleared = accessor
            .get_teacher_inform_with_uuid(&TeacherUuid::from("teacher-000000000001"))
            .await
            .unwrap();
        assert_eq!((cleared.grade, cleared.class), (None, None));

        let unassigned = accessor
            .get_teacher_uuids_with_inform(&TeacherInformRevision {
                class: Some(Class(0)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            unassigned,
            vec![TeacherUuid::from("teacher-000000000001"), TeacherUuid::from("teacher-000000000003")]
        );

        accessor.commit().await.unwrap();
        assert_eq!(store.row_count(&TEACHER_INFORMS), 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_partial_update_touches_only_supplied_fields() {
        let (_store, mut accessor) = seeded().await;
        let uuid = StudentUuid::from(STUDENT);
        let before = accessor.get_student_inform_with_uuid(&uuid).await.unwrap();

        let revision = StudentInformRevision {
            phone_number: Some(PhoneNumber::from("01099998888")),
            ..Default::default()
        };
        accessor.modify_student_inform(&uuid, &revision).await.unwrap();

        let after = accessor.get_student_inform_with_uuid(&uuid).await.unwrap();
        assert_eq!(after.phone_number.as_str(), "01099998888");
        assert_eq!(
            StudentInform {
                phone_number: before.phone_number.clone(),
                updated_at: before.updated_at,
                ..after
            },
            before
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicates_on_backtick_values_classify_cleanly() {
        let (store, mut accessor) = seeded().await;
        let other = "student-000000000002";
        accessor
            .create_student_auth(&student_auth(other, "p`x`1", None))
            .await
            .unwrap();

        match accessor.create_student_auth(&student_auth("student-000000000003", "p`x`1", None)).await {
            Err(DbError::DuplicateEntry(dup)) => assert_eq!(dup, DuplicateEntry::new("student_id", "p`x`1")),
            other => panic!("expected duplicate entry, got {other:?}"),
        }

        // Profile URIs never carry backticks into the engine at all.
        let mut inform = student_inform(other, (1, 1, 1), "01000000002");
        inform.profile_uri = ProfileUri::from("p`x.png");
        for _ in 0..2 {
            let err = accessor.create_student_inform(&inform).await.unwrap_err();
            assert!(matches!(
                err,
                DbError::Validation(ValidationError::Charset { field: "profile_uri" })
            ));
        }

        accessor.commit().await.unwrap();
        assert_eq!(store.row_count(&STUDENT_INFORMS), 1);
    }

    fn student_inform_revision() -> impl Strategy<Value = StudentInformRevision> {
        (
            option::of(1u8..=3),
            option::of(1u8..=4),
            option::of(1u8..=21),
            option::of("[가-힣]{2,4}"),
            option::of("010[0-9]{8}"),
            option::of("profiles/[a-z0-9]{1,12}\\.png"),
        )
            .prop_map(|(grade, class, number, name, phone, profile)| StudentInformRevision {
                grade: grade.map(Grade),
                class: class.map(Class),
                student_number: number.map(StudentNumber),
                name: name.as_deref().map(Name::from),
                phone_number: phone.as_deref().map(PhoneNumber::from),
                profile_uri: profile.as_deref().map(ProfileUri::from),
                ..Default::default()
            })
    }

    fn teacher_inform_revision() -> impl Strategy<Value = TeacherInformRevision> {
        (
            option::of(0u8..=3),
            option::of(0u8..=4),
            option::of("[가-힣]{2,4}"),
            option::of("010[0-9]{8}"),
        )
            .prop_map(|(grade, class, name, phone)| TeacherInformRevision {
                grade: grade.map(Grade),
                class: class.map(Class),
                name: name.as_deref().map(Name::from),
                phone_number: phone.as_deref().map(PhoneNumber::from),
                ..Default::default()
            })
    }

    fn student_auth_revision() -> impl Strategy<Value = StudentAuthRevision> {
        (
            option::of("[a-z][a-z0-9_.-]{3,19}"),
            option::of("[0-9a-f]{16,64}"),
            option::of(Just(ParentUuid::default())),
        )
            .prop_map(|(login, password, parent)| StudentAuthRevision {
                student_id: login.as_deref().map(StudentId::from),
                student_pw: password.as_deref().map(StudentPw::from),
                parent_uuid: parent,
                ..Default::default()
            })
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    /// `Grade(0)` and `Class(0)` clear a teacher's homeroom.
    fn homeroom<T: Copy>(supplied: Option<T>, zero: bool, current: Option<T>) -> Option<T> {
        match supplied {
            Some(_) if zero => None,
            Some(v) => Some(v),
            None => current,
        }
    }

    proptest! {
        #[test]
        fn prop_student_inform_revision_changes_only_supplied_fields(revision in student_inform_revision()) {
            let (before, after) = block_on(async {
                let (_store, mut accessor) = seeded().await;
                let uuid = StudentUuid::from(STUDENT);
                let before = accessor.get_student_inform_with_uuid(&uuid).await.unwrap();
                accessor.modify_student_inform(&uuid, &revision).await.unwrap();
                (before, accessor.get_student_inform_with_uuid(&uuid).await.unwrap())
            });

            let expected = StudentInform {
                grade: revision.grade.unwrap_or(before.grade),
                class: revision.class.unwrap_or(before.class),
                student_number: revision.student_number.unwrap_or(before.student_number),
                name: revision.name.clone().unwrap_or_else(|| before.name.clone()),
                phone_number: revision.phone_number.clone().unwrap_or_else(|| before.phone_number.clone()),
                profile_uri: revision.profile_uri.clone().unwrap_or_else(|| before.profile_uri.clone()),
                updated_at: after.updated_at,
                ..before.clone()
            };
            prop_assert_eq!(after, expected);
        }

        #[test]
        fn prop_teacher_inform_revision_changes_only_supplied_fields(revision in teacher_inform_revision()) {
            let (before, after) = block_on(async {
                let store = MemoryStore::new();
                let mut accessor = store.begin_tx().await.unwrap();
                let uuid = TeacherUuid::from(TEACHER);
                accessor.create_teacher_auth(&teacher_auth(TEACHER, "teacher1")).await.unwrap();
                let before = accessor
                    .create_teacher_inform(&teacher_inform(TEACHER, Some((2, 3)), "01000000001"))
                    .await
                    .unwrap();
                accessor.modify_teacher_inform(&uuid, &revision).await.unwrap();
                (before, accessor.get_teacher_inform_with_uuid(&uuid).await.unwrap())
            });

            let expected = TeacherInform {
                grade: homeroom(revision.grade, revision.grade == Some(Grade(0)), before.grade),
                class: homeroom(revision.class, revision.class == Some(Class(0)), before.class),
                name: revision.name.clone().unwrap_or_else(|| before.name.clone()),
                phone_number: revision.phone_number.clone().unwrap_or_else(|| before.phone_number.clone()),
                updated_at: after.updated_at,
                ..before.clone()
            };
            prop_assert_eq!(after, expected);
        }

        #[test]
        fn prop_student_auth_revision_changes_only_supplied_fields(revision in student_auth_revision()) {
            let (before, after) = block_on(async {
                let (_store, mut accessor) = seeded().await;
                let uuid = StudentUuid::from(STUDENT);
                let before = accessor.get_student_auth_with_uuid(&uuid).await.unwrap();
                accessor.modify_student_auth(&uuid, &revision).await.unwrap();
                (before, accessor.get_student_auth_with_uuid(&uuid).await.unwrap())
            });

            let expected = StudentAuth {
                student_id: revision.student_id.clone().unwrap_or_else(|| before.student_id.clone()),
                student_pw: revision.student_pw.clone().unwrap_or_else(|| before.student_pw.clone()),
                parent_uuid: if revision.parent_uuid.is_some() { None } else { before.parent_uuid.clone() },
                updated_at: after.updated_at,
                ..before.clone()
            };
            prop_assert_eq!(after, expected);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_identity_cannot_be_revised() {
        let (store, mut accessor) = seeded().await;
        let uuid = StudentUuid::from(STUDENT);

        let revision = StudentInformRevision {
            student_uuid: Some(StudentUuid::from("student-000000000099")),
            name: Some(Name::from("이학생")),
            ..Default::default()
        };
        let err = accessor.modify_student_inform(&uuid, &revision).await.unwrap_err();
        assert!(matches!(err, DbError::IdentityImmutable { field: "student_uuid" }));

        let auth_revision = ParentAuthRevision {
            uuid: Some(ParentUuid::from(PARENT)),
            ..Default::default()
        };
        let err = accessor
            .modify_parent_auth(&ParentUuid::from(PARENT), &auth_revision)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::IdentityImmutable { field: "parent_uuid" }));

        let inform = accessor.get_student_inform_with_uuid(&uuid).await.unwrap();
        assert_eq!(inform.name.as_str(), "박진홍");
        accessor.commit().await.unwrap();
        assert_eq!(store.rows(&STUDENT_INFORMS)[0].get("name"), Some(&Value::Text("박진홍".into())));
    }

    #[test_log::test(tokio::test)]
    async fn test_update_and_delete_of_missing_rows_succeed() {
        let (store, mut accessor) = seeded().await;
        let missing = StudentUuid::from("student-000000000404");

        let revision = StudentInformRevision {
            name: Some(Name::from("유령")),
            grade: Some(Grade(1)),
            ..Default::default()
        };
        accessor.modify_student_inform(&missing, &revision).await.unwrap();
        accessor
            .modify_parent_inform(&ParentUuid::from("parent-000000000404"), &ParentInformRevision {
                name: Some(Name::from("유령")),
                ..Default::default()
            })
            .await
            .unwrap();
        accessor.delete_student_auth(&missing).await.unwrap();
        accessor
            .delete_admin_auth(&AdminUuid::from("admin-000000000404"))
            .await
            .unwrap();
        accessor.commit().await.unwrap();

        assert_eq!(store.row_count(&STUDENT_AUTHS), 1);
        assert_eq!(store.row_count(&STUDENT_INFORMS), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_referenced_parent_cannot_be_deleted() {
        let (store, mut accessor) = seeded().await;
        let parent = ParentUuid::from(PARENT);

        match accessor.delete_parent_auth(&parent).await {
            Err(DbError::ForeignKeyConstraintFail(fk)) => {
                assert_eq!(fk.fk.table, "student_auths");
                assert_eq!(fk.reference.table, "parent_auths");
            }
            other => panic!("expected foreign key failure, got {other:?}"),
        }

        // Unlinking the student releases the parent.
        let unlink = StudentAuthRevision {
            parent_uuid: Some(ParentUuid::default()),
            ..Default::default()
        };
        accessor
            .modify_student_auth(&StudentUuid::from(STUDENT), &unlink)
            .await
            .unwrap();
        accessor.delete_parent_auth(&parent).await.unwrap();
        accessor.commit().await.unwrap();

        assert_eq!(store.row_count(&PARENT_AUTHS), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_relinking_to_unknown_parent_fails() {
        let (_store, mut accessor) = seeded().await;
        let relink = StudentAuthRevision {
            parent_uuid: Some(ParentUuid::from("parent-000000000404")),
            ..Default::default()
        };
        let err = accessor
            .modify_student_auth(&StudentUuid::from(STUDENT), &relink)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyConstraintFail(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_uuids_with_inform_filters_on_supplied_fields() {
        let (_store, mut accessor) = seeded().await;
        accessor
            .create_student_auth(&student_auth("student-000000000002", "student2", None))
            .await
            .unwrap();
        accessor
            .create_student_inform(&student_inform("student-000000000002", (2, 3, 1), "01000000002"))
            .await
            .unwrap();

        let second_graders = accessor
            .get_student_uuids_with_inform(&StudentInformRevision {
                grade: Some(Grade(2)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second_graders.len(), 2);

        let class_three = accessor
            .get_student_uuids_with_inform(&StudentInformRevision {
                grade: Some(Grade(2)),
                class: Some(Class(3)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(class_three, vec![StudentUuid::from("student-000000000002")]);

        let err = accessor
            .get_student_uuids_with_inform(&StudentInformRevision {
                grade: Some(Grade(3)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));

        let err = accessor
            .get_parent_uuids_with_inform(&ParentInformRevision::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[test_log::test(tokio::test)]
    async fn test_auth_revision_changes_password() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();
        let admin = AdminAuth {
            uuid: AdminUuid::from("admin-000000000001"),
            login_id: AdminId::from("root"),
            password: AdminPw::from("old-hash"),
            ..Default::default()
        };
        accessor.create_admin_auth(&admin).await.unwrap();

        let revision = AdminAuthRevision {
            password: Some(AdminPw::from("new-hash")),
            ..Default::default()
        };
        accessor.modify_admin_auth(&admin.uuid, &revision).await.unwrap();

        let stored = accessor.get_admin_auth_with_id(&AdminId::from("root")).await.unwrap();
        assert_eq!(stored.password.as_str(), "new-hash");

        let blank = AdminAuthRevision {
            password: Some(AdminPw::default()),
            ..Default::default()
        };
        let err = accessor.modify_admin_auth(&admin.uuid, &blank).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::Missing { field: "admin_pw" })));
    }

    #[test_log::test(tokio::test)]
    async fn test_concurrent_accessors_are_isolated() {
        let store = MemoryStore::new();
        let mut first = store.begin_tx().await.unwrap();
        let mut second = store.begin_tx().await.unwrap();

        first.create_parent_auth(&parent_auth(PARENT, "parent1")).await.unwrap();
        second
            .create_parent_auth(&parent_auth("parent-000000000002", "parent2"))
            .await
            .unwrap();

        assert!(first.get_parent_auth_with_id(&ParentId::from("parent1")).await.is_ok());
        assert!(matches!(
            second.get_parent_auth_with_id(&ParentId::from("parent1")).await,
            Err(DbError::NotFound)
        ));

        first.commit().await.unwrap();
        // Still invisible to a transaction that began before the commit.
        assert!(matches!(
            second.get_parent_auth_with_id(&ParentId::from("parent1")).await,
            Err(DbError::NotFound)
        ));
        second.commit().await.unwrap();

        let mut third = store.begin_tx().await.unwrap();
        assert!(third.get_parent_auth_with_id(&ParentId::from("parent1")).await.is_ok());
        assert!(third.get_parent_auth_with_id(&ParentId::from("parent2")).await.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_accessors_run_on_separate_tasks() {
        let store = MemoryStore::new();
        let handles: Vec<_> = (1..=4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut accessor = store.begin_tx().await?;
                    accessor
                        .create_parent_auth(&parent_auth(&format!("parent-00000000000{i}"), &format!("parent{i}")))
                        .await?;
                    accessor.commit().await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.row_count(&PARENT_AUTHS), 4);
    }

    #[test_log::test(tokio::test)]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut accessor = store.begin_tx().await.unwrap();
        accessor.create_parent_auth(&parent_auth(PARENT, "parent1")).await.unwrap();
        accessor.rollback().await.unwrap();

        assert_eq!(store.row_count(&PARENT_AUTHS), 0);
    }
}
