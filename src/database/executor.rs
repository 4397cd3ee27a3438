//! Query Executor
//!
//! Runs generated SQL text against the pool and collects the result rows into
//! backend-neutral [`Tuple`]s. Execution failures never escape as errors: they
//! are returned as [`QueryResult::ExecutionError`] so the interactive loop can
//! show them and carry on.

use crate::database::connection::DatabasePool;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, TypeInfo, ValueRef};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// A single column value, independent of the backend it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Text, and any type without a dedicated variant in its textual form
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Bytes(v) => {
                write!(f, "x'")?;
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// One result row, columns in result-set order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tuple(pub Vec<Value>);

impl<const N: usize> From<[Value; N]> for Tuple {
    fn from(values: [Value; N]) -> Self {
        Tuple(values.into())
    }
}

/// Rendered like a tuple literal: `(3,)`, `(1, 'alice')`
impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Outcome of running one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryResult {
    /// Rows in the order the database produced them (empty for DDL/DML)
    Rows(Vec<Tuple>),
    /// The database rejected or failed the statement
    ExecutionError(String),
}

impl QueryResult {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::ExecutionError(_))
    }
}

/// Anything that can run a generated statement
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run one statement. Failures are reported in the returned value.
    async fn execute(&self, sql: &str) -> QueryResult;
}

/// Run `sql` as raw text on a connection borrowed from `pool`.
///
/// The pool hands the connection back whichever way the call ends, including
/// when the timeout drops the future.
pub async fn execute(pool: &DatabasePool, sql: &str, timeout: Duration) -> QueryResult {
    debug!(sql, "executing generated query");

    match tokio::time::timeout(timeout, fetch_rows(pool, sql)).await {
        Ok(Ok(rows)) => {
            debug!(rows = rows.len(), "query completed");
            QueryResult::Rows(rows)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "query failed");
            QueryResult::ExecutionError(e.to_string())
        }
        Err(_) => {
            warn!(?timeout, "query timed out");
            QueryResult::ExecutionError(format!("query timed out after {:?}", timeout))
        }
    }
}

async fn fetch_rows(pool: &DatabasePool, sql: &str) -> Result<Vec<Tuple>, sqlx::Error> {
    match pool {
        DatabasePool::MySql(pool) => {
            let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
            rows.iter().map(decode_mysql_row).collect()
        }
        DatabasePool::Postgres(pool) => {
            let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
            rows.iter().map(decode_postgres_row).collect()
        }
        DatabasePool::Sqlite(pool) => {
            let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
            rows.iter().map(decode_sqlite_row).collect()
        }
    }
}

fn decode_mysql_row(row: &MySqlRow) -> Result<Tuple, sqlx::Error> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(idx)?.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = column.type_info().name();
        let typed = match type_name {
            "BOOLEAN" => row.try_get::<bool, _>(idx).map(Value::Bool),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                row.try_get::<i64, _>(idx).map(Value::Int)
            }
            name if name.ends_with("UNSIGNED") => row.try_get::<u64, _>(idx).map(Value::UInt),
            "FLOAT" => row.try_get::<f32, _>(idx).map(|v| Value::Float(v.into())),
            "DOUBLE" => row.try_get::<f64, _>(idx).map(Value::Float),
            "DATE" => row.try_get::<NaiveDate, _>(idx).map(Value::Date),
            "TIME" => row.try_get::<NaiveTime, _>(idx).map(Value::Time),
            "DATETIME" => row.try_get::<NaiveDateTime, _>(idx).map(Value::DateTime),
            "TIMESTAMP" => row.try_get::<DateTime<Utc>, _>(idx).map(Value::Timestamp),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
                row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes)
            }
            _ => textual(row, idx),
        };
        values.push(typed.or_else(|_| textual(row, idx))?);
    }
    Ok(Tuple(values))
}

fn decode_postgres_row(row: &PgRow) -> Result<Tuple, sqlx::Error> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(idx)?.is_null() {
            values.push(Value::Null);
            continue;
        }
        let typed = match column.type_info().name() {
            "BOOL" => row.try_get::<bool, _>(idx).map(Value::Bool),
            "INT2" => row.try_get::<i16, _>(idx).map(|v| Value::Int(v.into())),
            "INT4" => row.try_get::<i32, _>(idx).map(|v| Value::Int(v.into())),
            "INT8" => row.try_get::<i64, _>(idx).map(Value::Int),
            "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| Value::Float(v.into())),
            "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::Float),
            "DATE" => row.try_get::<NaiveDate, _>(idx).map(Value::Date),
            "TIME" => row.try_get::<NaiveTime, _>(idx).map(Value::Time),
            "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(idx).map(Value::DateTime),
            "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(idx).map(Value::Timestamp),
            "BYTEA" => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            _ => textual(row, idx),
        };
        values.push(typed.or_else(|_| textual(row, idx))?);
    }
    Ok(Tuple(values))
}

fn decode_sqlite_row(row: &SqliteRow) -> Result<Tuple, sqlx::Error> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        // Storage class of this value, not the declared column type
        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" => Value::Int(row.try_get::<i64, _>(idx)?),
            "REAL" => Value::Float(row.try_get::<f64, _>(idx)?),
            "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
            _ => textual(row, idx)?,
        };
        values.push(value);
    }
    Ok(Tuple(values))
}

/// Fall back to the value's textual form, then to its raw bytes
fn textual<'r, R>(row: &'r R, idx: usize) -> Result<Value, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database>,
    Vec<u8>: Decode<'r, R::Database>,
{
    row.try_get_unchecked::<String, _>(idx)
        .map(Value::Text)
        .or_else(|_| row.try_get_unchecked::<Vec<u8>, _>(idx).map(Value::Bytes))
}
