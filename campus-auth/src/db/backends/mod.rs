//! Transaction handles the accessor runs its statements through.
//!
//! A [`TxHandle`] is one open transaction against some engine. Statements are expressed as
//! a table descriptor plus column maps, so the accessor never builds SQL itself. Engine
//! failures come back already classified (see [`crate::db::classify`]).
//!
//! - [`mysql::MySqlTx`]: a live MySQL transaction.
//! - [`memory::MemoryTx`]: an in-process engine with the same key and constraint behaviour,
//!   used for tests and local development.

pub mod memory;
pub mod mysql;

pub use memory::{MemoryStore, MemoryTx};
pub use mysql::MySqlTx;

use crate::db::errors::Result;
use crate::db::fields::Columns;
use crate::db::schema::Table;

/// An open transaction.
///
/// Filters are equality matches on every supplied column; a `NULL` value matches `IS NULL`.
/// An empty filter matches every row.
#[async_trait::async_trait]
pub trait TxHandle: Send + Sized {
    async fn insert(&mut self, table: &'static Table, row: Columns) -> Result<()>;

    /// Every matching row, with all columns of the table present.
    async fn select(&mut self, table: &'static Table, filter: &Columns) -> Result<Vec<Columns>>;

    /// Returns the number of rows affected.
    async fn update(&mut self, table: &'static Table, filter: &Columns, payload: &Columns) -> Result<u64>;

    /// Returns the number of rows removed.
    async fn delete(&mut self, table: &'static Table, filter: &Columns) -> Result<u64>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
