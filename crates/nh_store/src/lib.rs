//! `nh_store` - `DuckDB` storage layer for netharvest
//!
//! This crate provides:
//! - `DuckDB` connection management
//! - Schema migrations
//! - The snapshot writer (delete-then-insert per device and day)
//! - Device inventory, refresh joins and run bookkeeping

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duckdb::Connection;
use duckdb::types::{ToSql, ToSqlOutput, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub mod devices;
pub mod lock;
pub mod migrations;
pub mod refresh;
pub mod schema;
pub mod snapshot;

pub use devices::{DeviceCounts, DeviceRow, InterfaceView, NewDevice, VersionInfo};
pub use lock::{HarvestRun, LockAttempt, RunMode};
pub use refresh::RefreshScope;
pub use schema::{DayScope, Table};
pub use snapshot::{SnapshotRow, SnapshotWriter, WriteOutcome};

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] duckdb::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Failed to decode column {column}: {message}")]
    Decode {
        column: &'static str,
        message: String,
    },

    #[error("Row {row} for {table} has {actual} values, expected {expected}")]
    ColumnMismatch {
        table: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A value bound into a generated statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(v) => ToSqlOutput::Owned(Value::BigInt(*v)),
            SqlValue::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
        })
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::Int)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<&Option<String>> for SqlValue {
    fn from(value: &Option<String>) -> Self {
        value.as_deref().map_or(SqlValue::Null, SqlValue::from)
    }
}

/// Format a day for binding with `CAST(? AS DATE)`
#[must_use]
pub fn day_param(day: NaiveDate) -> String {
    day.format(schema::DAY_FORMAT).to_string()
}

/// Format a UTC timestamp for binding into a `TIMESTAMP` column
#[must_use]
pub fn timestamp_param(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse a `CAST(ts AS TEXT)` value back into UTC
pub(crate) fn parse_timestamp(column: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Decode {
            column,
            message: format!("{raw:?}: {e}"),
        })
}

pub(crate) fn parse_day(column: &'static str, raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, schema::DAY_FORMAT).map_err(|e| StoreError::Decode {
        column,
        message: format!("{raw:?}: {e}"),
    })
}

/// Log a failed statement with its SQL text and pass the error through
pub(crate) fn log_failed(sql: &str, err: duckdb::Error) -> StoreError {
    error!(sql = %sql, error = %err, "Statement failed");
    StoreError::DatabaseError(err)
}

/// Main storage handle
pub struct NhStore {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl NhStore {
    /// Open or create database at path
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if directory creation, database opening, pragma setup, or
    /// migration execution fails.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = %path.display(), "Opening DuckDB database");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            r"
            PRAGMA threads=4;
            PRAGMA memory_limit='512MB';
        ",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_string_lossy().to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    /// Open in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if in-memory database setup or migrations fail.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        migrations::run_all(&conn)
    }

    /// Acquire the connection for the duration of one statement or transaction
    ///
    /// A poisoned lock is recovered. An open transaction of the panicking
    /// holder has already been rolled back when its guard dropped.
    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        Ok(self.conn.lock().unwrap_or_else(|poisoned| {
            warn!(db_path = %self.db_path, "Recovering poisoned connection lock");
            PoisonError::into_inner(poisoned)
        }))
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Execute a parameterized statement that returns no rows
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if statement preparation or execution fails.
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(sql, duckdb::params_from_iter(params.iter()))
            .map_err(|e| log_failed(sql, e))
    }

    /// Execute a batch of SQL statements
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if batch execution fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Count a device's rows in a snapshot table for one day
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn count_rows(
        &self,
        table: Table,
        device_id: i64,
        day: NaiveDate,
    ) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ? AND {} = CAST(? AS DATE)",
            schema::quote_ident(table.name()),
            schema::quote_ident(schema::columns::SWITCH_ID),
            schema::quote_ident(schema::columns::COLLECTED_ON),
        );
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row(&sql, duckdb::params![device_id, day_param(day)], |row| {
                row.get(0)
            })
            .map_err(|e| log_failed(&sql, e))?;
        Ok(count)
    }

    /// Record an ARP binding (normally written by an external harvester)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    pub fn insert_arp_entry(&self, mac_address: &str, ip_address: &str) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO arp_table (mac_address, ip_address) VALUES (?, ?)",
            &[mac_address.into(), ip_address.into()],
        )?;
        Ok(())
    }
}
