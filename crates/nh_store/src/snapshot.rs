//! Per-device snapshot replacement.
//!
//! A replace deletes the device's slice of a table (for the day when the table
//! is day-scoped) and inserts the new rows in chunked multi-row `INSERT`s, all
//! inside one transaction. Any failure rolls the delete back with it.

use crate::schema::{DayScope, Table, columns, quote_ident};
use crate::{NhStore, SqlValue, StoreError, day_param, log_failed};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A record that binds itself as one row of a snapshot table.
///
/// Values must follow [`Table::columns`] order for the target table.
pub trait SnapshotRow {
    fn row_values(&self) -> Vec<SqlValue>;
}

/// Result of a replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Replaced { deleted: usize, inserted: usize },
    /// Nothing to write; the previous snapshot was left in place
    SkippedEmpty,
}

impl WriteOutcome {
    #[must_use]
    pub fn inserted(&self) -> usize {
        match self {
            WriteOutcome::Replaced { inserted, .. } => *inserted,
            WriteOutcome::SkippedEmpty => 0,
        }
    }
}

/// Delete-then-insert writer shared by every collection step
#[derive(Clone)]
pub struct SnapshotWriter {
    store: Arc<NhStore>,
    chunk_size: usize,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(store: Arc<NhStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<NhStore> {
        &self.store
    }

    /// Atomically replace a device's rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ColumnMismatch`] before touching the table when a row
    /// binds the wrong number of values, or a database error when any statement
    /// fails (the transaction is rolled back).
    #[instrument(skip(self, table, rows), fields(table = table.name(), rows = rows.len()))]
    pub fn replace<R: SnapshotRow>(
        &self,
        table: Table,
        device_id: i64,
        day: NaiveDate,
        rows: &[R],
    ) -> Result<WriteOutcome, StoreError> {
        if rows.is_empty() {
            warn!(device_id, table = table.name(), "No rows to write, keeping previous snapshot");
            return Ok(WriteOutcome::SkippedEmpty);
        }

        let width = table.columns().len();
        let bound: Vec<Vec<SqlValue>> = rows.iter().map(SnapshotRow::row_values).collect();
        if let Some((row, values)) = bound.iter().enumerate().find(|(_, v)| v.len() != width) {
            return Err(StoreError::ColumnMismatch {
                table: table.name(),
                row,
                expected: width,
                actual: values.len(),
            });
        }

        let day_text = day_param(day);
        let mut conn = self.store.lock_conn()?;
        let tx = conn.transaction()?;

        let (delete_sql, delete_params) = delete_statement(table, device_id, &day_text);
        let deleted = tx
            .execute(&delete_sql, duckdb::params_from_iter(delete_params.iter()))
            .map_err(|e| log_failed(&delete_sql, e))?;

        let mut inserted = 0;
        for chunk in bound.chunks(self.chunk_size) {
            let insert_sql = insert_statement(table, chunk.len());
            let mut params = Vec::with_capacity(chunk.len() * (width + 2));
            for values in chunk {
                params.push(SqlValue::Int(device_id));
                params.push(SqlValue::Text(day_text.clone()));
                params.extend(values.iter().cloned());
            }
            inserted += tx
                .execute(&insert_sql, duckdb::params_from_iter(params.iter()))
                .map_err(|e| log_failed(&insert_sql, e))?;
        }

        tx.commit()?;

        debug!(device_id, table = table.name(), deleted, inserted, "Snapshot replaced");
        Ok(WriteOutcome::Replaced { deleted, inserted })
    }
}

fn delete_statement(table: Table, device_id: i64, day: &str) -> (String, Vec<SqlValue>) {
    match table.day_scope() {
        DayScope::Daily => (
            format!(
                "DELETE FROM {} WHERE {} = ? AND {} = CAST(? AS DATE)",
                quote_ident(table.name()),
                quote_ident(columns::SWITCH_ID),
                quote_ident(columns::COLLECTED_ON),
            ),
            vec![SqlValue::Int(device_id), SqlValue::Text(day.to_string())],
        ),
        DayScope::Latest => (
            format!(
                "DELETE FROM {} WHERE {} = ?",
                quote_ident(table.name()),
                quote_ident(columns::SWITCH_ID),
            ),
            vec![SqlValue::Int(device_id)],
        ),
    }
}

/// Multi-row insert for `rows` rows of `table`
fn insert_statement(table: Table, rows: usize) -> String {
    let mut column_list = vec![
        quote_ident(columns::SWITCH_ID),
        quote_ident(columns::COLLECTED_ON),
    ];
    column_list.extend(table.columns().iter().map(|c| quote_ident(c)));

    let mut placeholders = vec!["?", "CAST(? AS DATE)"];
    placeholders.extend(std::iter::repeat_n("?", table.columns().len()));
    let group = format!("({})", placeholders.join(", "));

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table.name()),
        column_list.join(", "),
        vec![group; rows].join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConfigLine {
        interface: Option<&'static str>,
        configuration: &'static str,
    }

    impl SnapshotRow for ConfigLine {
        fn row_values(&self) -> Vec<SqlValue> {
            vec![
                self.interface.map_or(SqlValue::Null, SqlValue::from),
                self.configuration.into(),
            ]
        }
    }

    struct MacRow(&'static str, &'static str);

    impl SnapshotRow for MacRow {
        fn row_values(&self) -> Vec<SqlValue> {
            vec![self.0.into(), self.1.into(), "10".into(), "DYNAMIC".into()]
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn writer(chunk: usize) -> SnapshotWriter {
        SnapshotWriter::new(Arc::new(NhStore::open_memory().unwrap()), chunk)
    }

    fn block(interface: &'static str) -> ConfigLine {
        ConfigLine {
            interface: Some(interface),
            configuration: "switchport mode access",
        }
    }

    #[test]
    fn test_insert_statement_shape() {
        let sql = insert_statement(Table::RunningConfig, 2);
        assert_eq!(
            sql,
            "INSERT INTO \"show_running_config\" (\"switch_id\", \"collected_on\", \"interface\", \"configuration\") \
             VALUES (?, CAST(? AS DATE), ?, ?), (?, CAST(? AS DATE), ?, ?)"
        );
    }

    #[test]
    fn test_replace_inserts_rows() {
        let writer = writer(1000);
        let rows = [block("Gi1/0/1"), block("Gi1/0/2")];
        let outcome = writer.replace(Table::RunningConfig, 1, day(14), &rows).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Replaced {
                deleted: 0,
                inserted: 2
            }
        );
        assert_eq!(
            writer.store().count_rows(Table::RunningConfig, 1, day(14)).unwrap(),
            2
        );
    }

    #[test]
    fn test_replace_is_idempotent() {
        let writer = writer(1000);
        let rows = [
            MacRow("Gi1/0/1", "aaaa.bbbb.cccc"),
            MacRow("Gi1/0/2", "aaaa.bbbb.dddd"),
        ];
        writer.replace(Table::MacAddressTable, 1, day(14), &rows).unwrap();
        let second = writer.replace(Table::MacAddressTable, 1, day(14), &rows).unwrap();
        assert_eq!(
            second,
            WriteOutcome::Replaced {
                deleted: 2,
                inserted: 2
            }
        );
        assert_eq!(
            writer.store().count_rows(Table::MacAddressTable, 1, day(14)).unwrap(),
            2
        );
    }

    #[test]
    fn test_daily_tables_keep_other_days() {
        let writer = writer(1000);
        writer
            .replace(Table::MacAddressTable, 1, day(13), &[MacRow("Gi1/0/1", "a.b.c")])
            .unwrap();
        writer
            .replace(Table::MacAddressTable, 1, day(14), &[MacRow("Gi1/0/9", "d.e.f")])
            .unwrap();
        let store = writer.store();
        assert_eq!(store.count_rows(Table::MacAddressTable, 1, day(13)).unwrap(), 1);
        assert_eq!(store.count_rows(Table::MacAddressTable, 1, day(14)).unwrap(), 1);
    }

    #[test]
    fn test_latest_tables_drop_other_days() {
        let writer = writer(1000);
        writer
            .replace(Table::RunningConfig, 1, day(13), &[block("Gi1/0/1")])
            .unwrap();
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/2")])
            .unwrap();
        let store = writer.store();
        assert_eq!(store.count_rows(Table::RunningConfig, 1, day(13)).unwrap(), 0);
        assert_eq!(store.count_rows(Table::RunningConfig, 1, day(14)).unwrap(), 1);
    }

    #[test]
    fn test_devices_do_not_interfere() {
        let writer = writer(1000);
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/1")])
            .unwrap();
        writer
            .replace(Table::RunningConfig, 2, day(14), &[block("Gi1/0/1"), block("Gi1/0/2")])
            .unwrap();
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/3")])
            .unwrap();
        let store = writer.store();
        assert_eq!(store.count_rows(Table::RunningConfig, 1, day(14)).unwrap(), 1);
        assert_eq!(store.count_rows(Table::RunningConfig, 2, day(14)).unwrap(), 2);
    }

    #[test]
    fn test_empty_rows_preserve_previous_snapshot() {
        let writer = writer(1000);
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/1")])
            .unwrap();
        let outcome = writer
            .replace::<ConfigLine>(Table::RunningConfig, 1, day(14), &[])
            .unwrap();
        assert_eq!(outcome, WriteOutcome::SkippedEmpty);
        assert_eq!(
            writer.store().count_rows(Table::RunningConfig, 1, day(14)).unwrap(),
            1
        );
    }

    #[test]
    fn test_chunked_insert_counts_every_row() {
        let writer = writer(3);
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let rows: Vec<MacRow> = names.iter().map(|n| MacRow(*n, "0000.1111.2222")).collect();
        let outcome = writer.replace(Table::MacAddressTable, 5, day(14), &rows).unwrap();
        assert_eq!(outcome.inserted(), 7);
        assert_eq!(
            writer.store().count_rows(Table::MacAddressTable, 5, day(14)).unwrap(),
            7
        );
    }

    #[test]
    fn test_failed_chunk_rolls_back_delete() {
        let writer = writer(2);
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/1")])
            .unwrap();

        // the third row violates NOT NULL on interface and lands in the second chunk
        let rows = [
            block("Gi1/0/2"),
            block("Gi1/0/3"),
            ConfigLine {
                interface: None,
                configuration: "shutdown",
            },
        ];
        let err = writer.replace(Table::RunningConfig, 1, day(14), &rows).unwrap_err();
        assert!(matches!(err, StoreError::DatabaseError(_)));

        assert_eq!(
            writer.store().count_rows(Table::RunningConfig, 1, day(14)).unwrap(),
            1
        );
    }

    #[test]
    fn test_column_mismatch_rejected_before_delete() {
        struct Short;
        impl SnapshotRow for Short {
            fn row_values(&self) -> Vec<SqlValue> {
                vec!["Gi1/0/1".into()]
            }
        }

        let writer = writer(1000);
        writer
            .replace(Table::RunningConfig, 1, day(14), &[block("Gi1/0/1")])
            .unwrap();
        let err = writer.replace(Table::RunningConfig, 1, day(14), &[Short]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ColumnMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert_eq!(
            writer.store().count_rows(Table::RunningConfig, 1, day(14)).unwrap(),
            1
        );
    }
}
