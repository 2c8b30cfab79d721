//! Run-level lock and harvest run history

use crate::{NhStore, StoreError, day_param, log_failed, parse_day, parse_timestamp, timestamp_param};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const LOCK_NAME: &str = "harvest";

/// Result of trying to take the run lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired,
    /// A lock older than the stale threshold was taken over
    TookOver {
        previous_holder: String,
        acquired_at: DateTime<Utc>,
    },
    /// Another run holds a fresh lock
    Held {
        holder: String,
        acquired_at: DateTime<Utc>,
    },
}

impl LockAttempt {
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        !matches!(self, LockAttempt::Held { .. })
    }
}

/// Full fleet run or single-device run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Device,
}

impl RunMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Device => "device",
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "full" => Ok(RunMode::Full),
            "device" => Ok(RunMode::Device),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// One row of `harvest_runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRun {
    /// Assigned by the store; ignored on insert
    pub id: Option<i64>,
    pub mode: RunMode,
    pub device_id: Option<i64>,
    pub day: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub devices_total: i64,
    pub devices_reachable: i64,
    pub devices_unreachable: i64,
    pub devices_succeeded: i64,
    pub devices_failed: i64,
}

impl NhStore {
    /// Try to take the single harvest lock.
    ///
    /// A lock held longer than `stale_after` is taken over.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lock table cannot be read or written.
    pub fn try_acquire_run_lock(
        &self,
        holder: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<LockAttempt, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let existing = match tx.query_row(
            "SELECT holder, CAST(acquired_at AS TEXT) FROM harvest_lock WHERE name = ?",
            [LOCK_NAME],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        ) {
            Ok(row) => Some(row),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let attempt = match existing {
            None => {
                let sql = "INSERT INTO harvest_lock (name, holder, acquired_at) VALUES (?, ?, CAST(? AS TIMESTAMP))";
                tx.execute(sql, duckdb::params![LOCK_NAME, holder, timestamp_param(now)])
                    .map_err(|e| log_failed(sql, e))?;
                LockAttempt::Acquired
            }
            Some((previous_holder, raw_acquired)) => {
                let acquired_at = parse_timestamp("acquired_at", &raw_acquired)?;
                let age = now.signed_duration_since(acquired_at);
                let stale = age.to_std().is_ok_and(|age| age >= stale_after);
                if !stale {
                    return Ok(LockAttempt::Held {
                        holder: previous_holder,
                        acquired_at,
                    });
                }
                warn!(
                    previous_holder = %previous_holder,
                    age_secs = age.num_seconds(),
                    "Taking over stale harvest lock"
                );
                let sql = "UPDATE harvest_lock SET holder = ?, acquired_at = CAST(? AS TIMESTAMP) WHERE name = ?";
                tx.execute(sql, duckdb::params![holder, timestamp_param(now), LOCK_NAME])
                    .map_err(|e| log_failed(sql, e))?;
                LockAttempt::TookOver {
                    previous_holder,
                    acquired_at,
                }
            }
        };

        tx.commit()?;
        info!(holder, "Harvest lock acquired");
        Ok(attempt)
    }

    /// Release the lock if `holder` still owns it
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    pub fn release_run_lock(&self, holder: &str) -> Result<bool, StoreError> {
        let sql = "DELETE FROM harvest_lock WHERE name = ? AND holder = ?";
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute(sql, duckdb::params![LOCK_NAME, holder])
            .map_err(|e| log_failed(sql, e))?;
        Ok(deleted > 0)
    }

    /// Append a finished run, returning its id
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    pub fn record_harvest_run(&self, run: &HarvestRun) -> Result<i64, StoreError> {
        let sql = "INSERT INTO harvest_runs (mode, device_id, run_day, started_at, finished_at, \
                   devices_total, devices_reachable, devices_unreachable, devices_succeeded, devices_failed) \
                   VALUES (?, ?, CAST(? AS DATE), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?) \
                   RETURNING id";
        let conn = self.lock_conn()?;
        let id: i64 = conn
            .query_row(
                sql,
                duckdb::params![
                    run.mode.as_str(),
                    run.device_id,
                    day_param(run.day),
                    timestamp_param(run.started_at),
                    timestamp_param(run.finished_at),
                    run.devices_total,
                    run.devices_reachable,
                    run.devices_unreachable,
                    run.devices_succeeded,
                    run.devices_failed
                ],
                |row| row.get(0),
            )
            .map_err(|e| log_failed(sql, e))?;
        Ok(id)
    }

    /// Most recent runs first
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row cannot be decoded.
    pub fn list_harvest_runs(&self, limit: usize) -> Result<Vec<HarvestRun>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, mode, device_id, CAST(run_day AS TEXT), CAST(started_at AS TEXT), \
                    CAST(finished_at AS TEXT), devices_total, devices_reachable, \
                    devices_unreachable, devices_succeeded, devices_failed \
             FROM harvest_runs ORDER BY id DESC LIMIT ?",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let raw = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    [
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, i64>(9)?,
                        row.get::<_, i64>(10)?,
                    ],
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, mode, device_id, day, started, finished, counts)| {
                let [total, reachable, unreachable, succeeded, failed] = counts;
                Ok(HarvestRun {
                    id: Some(id),
                    mode: mode.parse().map_err(|message| StoreError::Decode {
                        column: "mode",
                        message,
                    })?,
                    device_id,
                    day: parse_day("run_day", &day)?,
                    started_at: parse_timestamp("started_at", &started)?,
                    finished_at: parse_timestamp("finished_at", &finished)?,
                    devices_total: total,
                    devices_reachable: reachable,
                    devices_unreachable: unreachable,
                    devices_succeeded: succeeded,
                    devices_failed: failed,
                })
            })
            .collect()
    }
}
