//! In-process storage engine with MySQL key semantics.
//!
//! Rows live in plain maps guarded by a `parking_lot` mutex. Each [`MemoryTx`] works on a
//! private snapshot of the committed state and keeps a journal of the statements it ran;
//! commit replays the journal onto the latest committed state, re-checking every constraint,
//! and publishes the result atomically. Concurrent transactions therefore never see each
//! other's uncommitted writes, and a commit that would break a key fails as a whole.
//!
//! Constraint violations are reported with the same error numbers and message grammar the
//! MySQL server uses, so they travel through [`crate::db::classify`] exactly like real ones.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::TxHandle;
use crate::db::classify::{DuplicateEntry, EngineError, FkInfo, ForeignKeyConstraintFail, RefInfo};
use crate::db::errors::Result;
use crate::db::fields::{Columns, Value};
use crate::db::schema::{self, ForeignKey, Table};

/// Database name reported in foreign-key failures.
pub const MEMORY_DATABASE: &str = "memory";

/// `ER_BAD_NULL_ERROR`
const ER_BAD_NULL: u16 = 1048;
/// `ER_BAD_FIELD_ERROR`
const ER_BAD_FIELD: u16 = 1054;

fn matches(row: &Columns, filter: &Columns) -> bool {
    filter.iter().all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

fn table_named(name: &str) -> Option<&'static Table> {
    schema::TABLES.iter().copied().find(|t| t.name == name)
}

fn fk_failure(table: &Table, fk: &ForeignKey) -> ForeignKeyConstraintFail {
    ForeignKeyConstraintFail::new(
        FkInfo {
            db: MEMORY_DATABASE.to_string(),
            table: table.name.to_string(),
            constraint: fk.constraint.to_string(),
            attribute: fk.column.to_string(),
        },
        RefInfo {
            table: fk.ref_table.to_string(),
            attribute: fk.ref_column.to_string(),
        },
    )
}

fn check_columns(table: &Table, columns: &Columns, clause: &str) -> std::result::Result<(), EngineError> {
    match columns.keys().find(|c| table.column(c).is_none()) {
        Some(unknown) => Err(EngineError::new(
            ER_BAD_FIELD,
            format!("Unknown column '{unknown}' in '{clause}'"),
        )),
        None => Ok(()),
    }
}

fn check_not_null(table: &Table, row: &Columns) -> std::result::Result<(), EngineError> {
    for def in table.columns.iter().filter(|d| !d.nullable) {
        if row.get(def.name).is_none_or(Value::is_null) {
            return Err(EngineError::new(ER_BAD_NULL, format!("Column '{}' cannot be null", def.name)));
        }
    }
    Ok(())
}

/// Check `row` against the identity and single-column unique keys of `rows`, ignoring the
/// row at `skip` (the row's own previous version on update).
fn check_unique(
    table: &Table,
    rows: &[Columns],
    row: &Columns,
    skip: Option<usize>,
) -> std::result::Result<(), EngineError> {
    for def in table.columns.iter().filter(|d| d.unique || d.name == table.identity) {
        let value = match row.get(def.name) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        let taken = rows
            .iter()
            .enumerate()
            .any(|(i, other)| Some(i) != skip && other.get(def.name) == Some(value));
        if taken {
            return Err(DuplicateEntry::new(table.key_name(def.name), value.to_string()).generate());
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Statement {
    Insert {
        table: &'static Table,
        row: Columns,
    },
    Update {
        table: &'static Table,
        filter: Columns,
        payload: Columns,
    },
    Delete {
        table: &'static Table,
        filter: Columns,
    },
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<&'static str, Vec<Columns>>,
}

impl Tables {
    fn rows(&self, table: &Table) -> &[Columns] {
        self.rows.get(table.name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn select(&self, table: &Table, filter: &Columns) -> Vec<Columns> {
        self.rows(table).iter().filter(|row| matches(row, filter)).cloned().collect()
    }

    /// Run one statement. A failing statement leaves the tables untouched.
    fn execute(&mut self, statement: &Statement, at: DateTime<Utc>) -> std::result::Result<u64, EngineError> {
        match statement {
            Statement::Insert { table, row } => self.insert(table, row, at),
            Statement::Update { table, filter, payload } => self.update(table, filter, payload, at),
            Statement::Delete { table, filter } => self.delete(table, filter),
        }
    }

    fn insert(&mut self, table: &'static Table, row: &Columns, at: DateTime<Utc>) -> std::result::Result<u64, EngineError> {
        check_columns(table, row, "field list")?;

        let mut full = Columns::new();
        for def in table.columns {
            let value = match row.get(def.name) {
                Some(value) => value.clone(),
                None if table.is_timestamp(def.name) => Value::Timestamp(at),
                None => Value::Null,
            };
            full.insert(def.name, value);
        }

        check_not_null(table, &full)?;
        check_unique(table, self.rows(table), &full, None)?;
        self.check_references(table, &full)?;

        self.rows.entry(table.name).or_default().push(full);
        Ok(1)
    }

    fn update(
        &mut self,
        table: &'static Table,
        filter: &Columns,
        payload: &Columns,
        at: DateTime<Utc>,
    ) -> std::result::Result<u64, EngineError> {
        check_columns(table, payload, "field list")?;
        check_columns(table, filter, "where clause")?;

        let mut staged = self.rows(table).to_vec();
        let mut changed = 0;
        for i in 0..staged.len() {
            if !matches(&staged[i], filter) {
                continue;
            }

            let mut next = staged[i].clone();
            for (column, value) in payload {
                next.insert(column, value.clone());
            }
            // Rows whose values do not change are not counted as affected.
            if next == staged[i] {
                continue;
            }
            if let Some(def) = table.column("updated_at") {
                next.insert(def.name, Value::Timestamp(at));
            }

            check_not_null(table, &next)?;
            self.check_not_referenced(table, &staged[i], Some(&next))?;
            check_unique(table, &staged, &next, Some(i))?;
            self.check_references(table, &next)?;

            staged[i] = next;
            changed += 1;
        }

        self.rows.insert(table.name, staged);
        Ok(changed)
    }

    fn delete(&mut self, table: &'static Table, filter: &Columns) -> std::result::Result<u64, EngineError> {
        check_columns(table, filter, "where clause")?;

        let (doomed, kept): (Vec<Columns>, Vec<Columns>) =
            self.rows(table).iter().cloned().partition(|row| matches(row, filter));
        for row in &doomed {
            self.check_not_referenced(table, row, None)?;
        }

        self.rows.insert(table.name, kept);
        Ok(doomed.len() as u64)
    }

    /// Every non-null foreign key in `row` must point at an existing parent row.
    fn check_references(&self, table: &Table, row: &Columns) -> std::result::Result<(), EngineError> {
        for fk in table.foreign_keys {
            let value = match row.get(fk.column) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let exists = table_named(fk.ref_table)
                .is_some_and(|parent| self.rows(parent).iter().any(|r| r.get(fk.ref_column) == Some(value)));
            if !exists {
                return Err(fk_failure(table, fk).generate());
            }
        }
        Ok(())
    }

    /// A parent row may not be removed, nor its referenced key changed, while children point
    /// at it. `next` is the row's replacement on update, `None` on delete.
    fn check_not_referenced(
        &self,
        table: &Table,
        row: &Columns,
        next: Option<&Columns>,
    ) -> std::result::Result<(), EngineError> {
        for child in schema::TABLES {
            for fk in child.foreign_keys.iter().filter(|fk| fk.ref_table == table.name) {
                let value = match row.get(fk.ref_column) {
                    Some(v) if !v.is_null() => v,
                    _ => continue,
                };
                if next.is_some_and(|n| n.get(fk.ref_column) == Some(value)) {
                    continue;
                }
                if self.rows(child).iter().any(|r| r.get(fk.column) == Some(value)) {
                    return Err(fk_failure(child, fk).generate_referenced());
                }
            }
        }
        Ok(())
    }
}

/// Shared committed state. Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction on a snapshot of the current committed state.
    pub fn begin(&self) -> MemoryTx {
        MemoryTx {
            committed: Arc::clone(&self.committed),
            snapshot: self.committed.lock().clone(),
            journal: Vec::new(),
        }
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &Table) -> Vec<Columns> {
        self.committed.lock().rows(table).to_vec()
    }

    pub fn row_count(&self, table: &Table) -> usize {
        self.committed.lock().rows(table).len()
    }
}

/// A transaction against a [`MemoryStore`]. Dropping it discards its writes.
#[derive(Debug)]
pub struct MemoryTx {
    committed: Arc<Mutex<Tables>>,
    snapshot: Tables,
    journal: Vec<(DateTime<Utc>, Statement)>,
}

impl MemoryTx {
    fn run(&mut self, statement: Statement) -> Result<u64> {
        let at = Utc::now();
        let affected = self.snapshot.execute(&statement, at)?;
        self.journal.push((at, statement));
        Ok(affected)
    }
}

#[async_trait::async_trait]
impl TxHandle for MemoryTx {
    async fn insert(&mut self, table: &'static Table, row: Columns) -> Result<()> {
        self.run(Statement::Insert { table, row })?;
        Ok(())
    }

    async fn select(&mut self, table: &'static Table, filter: &Columns) -> Result<Vec<Columns>> {
        check_columns(table, filter, "where clause")?;
        Ok(self.snapshot.select(table, filter))
    }

    async fn update(&mut self, table: &'static Table, filter: &Columns, payload: &Columns) -> Result<u64> {
        if payload.is_empty() {
            return Ok(0);
        }
        self.run(Statement::Update {
            table,
            filter: filter.clone(),
            payload: payload.clone(),
        })
    }

    async fn delete(&mut self, table: &'static Table, filter: &Columns) -> Result<u64> {
        self.run(Statement::Delete {
            table,
            filter: filter.clone(),
        })
    }

    async fn commit(self) -> Result<()> {
        let mut committed = self.committed.lock();
        let mut next = committed.clone();
        for (at, statement) in &self.journal {
            next.execute(statement, *at)?;
        }
        *committed = next;
        tracing::trace!(statements = self.journal.len(), "memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::trace!(statements = self.journal.len(), "memory transaction rolled back");
        Ok(())
    }
}
