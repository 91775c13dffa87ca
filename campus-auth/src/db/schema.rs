//! Static descriptors for the seven account tables.
//!
//! The descriptors mirror `migrations/` and are what the transaction backends use to
//! build statements, decode rows and (for the in-memory engine) enforce keys.

/// Storage class of a column, used when decoding rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Text,
    Timestamp,
}

#[derive(Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    /// Covered by a single-column UNIQUE index named after the column.
    pub unique: bool,
}

/// A RESTRICT foreign key from `column` to `ref_table.ref_column`.
#[derive(Debug)]
pub struct ForeignKey {
    pub constraint: &'static str,
    pub column: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
}

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    /// Primary key column.
    pub identity: &'static str,
    pub columns: &'static [ColumnDef],
    pub foreign_keys: &'static [ForeignKey],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name reported by the engine for a violated unique index on `column`.
    pub fn key_name(&self, column: &str) -> &'static str {
        if column == self.identity {
            return PRIMARY_KEY_NAME;
        }
        self.column(column).map(|c| c.name).unwrap_or(PRIMARY_KEY_NAME)
    }

    pub fn is_timestamp(&self, column: &str) -> bool {
        matches!(self.column(column), Some(ColumnDef { kind: ColumnKind::Timestamp, .. }))
    }
}

pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: false,
        unique: false,
    }
}

const fn unique(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: false,
        unique: true,
    }
}

const fn nullable(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: true,
        unique: false,
    }
}

const CREATED_AT: ColumnDef = col("created_at", ColumnKind::Timestamp);
const UPDATED_AT: ColumnDef = col("updated_at", ColumnKind::Timestamp);

pub static PARENT_AUTHS: Table = Table {
    name: "parent_auths",
    identity: "parent_uuid",
    columns: &[
        col("parent_uuid", ColumnKind::Text),
        unique("parent_id", ColumnKind::Text),
        col("parent_pw", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[],
};

pub static ADMIN_AUTHS: Table = Table {
    name: "admin_auths",
    identity: "admin_uuid",
    columns: &[
        col("admin_uuid", ColumnKind::Text),
        unique("admin_id", ColumnKind::Text),
        col("admin_pw", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[],
};

pub static TEACHER_AUTHS: Table = Table {
    name: "teacher_auths",
    identity: "teacher_uuid",
    columns: &[
        col("teacher_uuid", ColumnKind::Text),
        unique("teacher_id", ColumnKind::Text),
        col("teacher_pw", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[],
};

pub static STUDENT_AUTHS: Table = Table {
    name: "student_auths",
    identity: "student_uuid",
    columns: &[
        col("student_uuid", ColumnKind::Text),
        unique("student_id", ColumnKind::Text),
        col("student_pw", ColumnKind::Text),
        nullable("parent_uuid", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        constraint: "fk_student_auths_parent_uuid",
        column: "parent_uuid",
        ref_table: "parent_auths",
        ref_column: "parent_uuid",
    }],
};

pub static PARENT_INFORMS: Table = Table {
    name: "parent_informs",
    identity: "parent_uuid",
    columns: &[
        col("parent_uuid", ColumnKind::Text),
        col("name", ColumnKind::Text),
        unique("phone_number", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        constraint: "fk_parent_informs_parent_uuid",
        column: "parent_uuid",
        ref_table: "parent_auths",
        ref_column: "parent_uuid",
    }],
};

pub static TEACHER_INFORMS: Table = Table {
    name: "teacher_informs",
    identity: "teacher_uuid",
    columns: &[
        col("teacher_uuid", ColumnKind::Text),
        nullable("grade", ColumnKind::Int),
        nullable("class", ColumnKind::Int),
        col("name", ColumnKind::Text),
        unique("phone_number", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        constraint: "fk_teacher_informs_teacher_uuid",
        column: "teacher_uuid",
        ref_table: "teacher_auths",
        ref_column: "teacher_uuid",
    }],
};

pub static STUDENT_INFORMS: Table = Table {
    name: "student_informs",
    identity: "student_uuid",
    columns: &[
        col("student_uuid", ColumnKind::Text),
        col("grade", ColumnKind::Int),
        col("class", ColumnKind::Int),
        col("student_number", ColumnKind::Int),
        col("name", ColumnKind::Text),
        unique("phone_number", ColumnKind::Text),
        unique("profile_uri", ColumnKind::Text),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        constraint: "fk_student_informs_student_uuid",
        column: "student_uuid",
        ref_table: "student_auths",
        ref_column: "student_uuid",
    }],
};

/// All tables, parents before children.
pub static TABLES: [&Table; 7] = [
    &PARENT_AUTHS,
    &ADMIN_AUTHS,
    &TEACHER_AUTHS,
    &STUDENT_AUTHS,
    &PARENT_INFORMS,
    &TEACHER_INFORMS,
    &STUDENT_INFORMS,
];
