//! MySQL transactions via SQLx.

use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, QueryBuilder, Row, Transaction};
use tracing::instrument;

use super::TxHandle;
use crate::db::errors::Result;
use crate::db::fields::{Columns, Value};
use crate::db::schema::{ColumnKind, Table};

/// A live transaction checked out of a `MySqlPool`.
///
/// Dropping it without calling [`TxHandle::commit`] rolls the transaction back.
pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

impl MySqlTx {
    pub fn new(tx: Transaction<'static, MySql>) -> Self {
        Self { tx }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, MySql>, value: &Value) {
    match value {
        Value::Null => builder.push("NULL"),
        Value::Int(i) => builder.push_bind(*i),
        Value::Text(s) => builder.push_bind(s.clone()),
        Value::Timestamp(t) => builder.push_bind(*t),
    };
}

/// Append ` WHERE ...` for an equality filter.
fn push_filter(builder: &mut QueryBuilder<'_, MySql>, filter: &Columns) {
    builder.push(" WHERE 1=1");
    for (column, value) in filter {
        builder.push(format!(" AND `{column}`"));
        if value.is_null() {
            builder.push(" IS NULL");
        } else {
            builder.push(" = ");
            push_value(builder, value);
        }
    }
}

fn decode_row(table: &Table, row: &MySqlRow) -> Result<Columns> {
    let mut columns = Columns::new();
    for def in table.columns {
        let value = match def.kind {
            ColumnKind::Int => row.try_get::<Option<i64>, _>(def.name)?.map_or(Value::Null, Value::Int),
            ColumnKind::Text => row.try_get::<Option<String>, _>(def.name)?.map_or(Value::Null, Value::Text),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(def.name)?
                .map_or(Value::Null, Value::Timestamp),
        };
        columns.insert(def.name, value);
    }
    Ok(columns)
}

#[async_trait::async_trait]
impl TxHandle for MySqlTx {
    #[instrument(skip(self, table, row), fields(table = table.name), err)]
    async fn insert(&mut self, table: &'static Table, row: Columns) -> Result<()> {
        let mut builder = QueryBuilder::<MySql>::new(format!("INSERT INTO `{}` (", table.name));

        let mut names = builder.separated(", ");
        for column in row.keys() {
            names.push(format!("`{column}`"));
        }
        builder.push(") VALUES (");
        for (i, value) in row.values().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(")");

        builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    #[instrument(skip(self, table, filter), fields(table = table.name), err)]
    async fn select(&mut self, table: &'static Table, filter: &Columns) -> Result<Vec<Columns>> {
        let mut builder = QueryBuilder::<MySql>::new("SELECT ");
        let mut names = builder.separated(", ");
        for def in table.columns {
            names.push(format!("`{}`", def.name));
        }
        builder.push(format!(" FROM `{}`", table.name));
        push_filter(&mut builder, filter);

        let rows = builder.build().fetch_all(&mut *self.tx).await?;
        rows.iter().map(|row| decode_row(table, row)).collect()
    }

    #[instrument(skip(self, table, filter, payload), fields(table = table.name), err)]
    async fn update(&mut self, table: &'static Table, filter: &Columns, payload: &Columns) -> Result<u64> {
        if payload.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<MySql>::new(format!("UPDATE `{}` SET ", table.name));
        for (i, (column, value)) in payload.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(format!("`{column}` = "));
            push_value(&mut builder, value);
        }
        push_filter(&mut builder, filter);

        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, table, filter), fields(table = table.name), err)]
    async fn delete(&mut self, table: &'static Table, filter: &Columns) -> Result<u64> {
        let mut builder = QueryBuilder::<MySql>::new(format!("DELETE FROM `{}`", table.name));
        push_filter(&mut builder, filter);

        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
