//! Switch inventory and typed read models

use crate::schema::tables;
use crate::{NhStore, StoreError, day_param, log_failed};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// One row of `switches`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: i64,
    pub fqdn: String,
    pub ip_address: Option<String>,
    /// `None` until the device has been probed once
    pub reachable: Option<bool>,
    pub hardware: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub software_image: Option<String>,
    pub serial: Option<String>,
    pub uptime: Option<String>,
    pub restarted: Option<String>,
    pub reload_reason: Option<String>,
    pub rommon: Option<String>,
}

/// A switch discovered by the telemetry source and not yet known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub fqdn: String,
    pub ip_address: Option<String>,
}

/// Fields reported by `show version`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub hardware: String,
    pub version: String,
    pub release: String,
    pub software_image: String,
    pub serial: String,
    pub uptime: String,
    pub restarted: String,
    pub reload_reason: String,
    pub rommon: String,
}

impl VersionInfo {
    /// True when the parser found nothing at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fleet reachability counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub total: i64,
    pub reachable: i64,
    pub unreachable: i64,
    pub never_probed: i64,
}

/// Derived interface row joined for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceView {
    pub interface: String,
    pub description: Option<String>,
    pub link_status: Option<String>,
    pub protocol_status: Option<String>,
    pub speed: Option<String>,
    pub duplex: Option<String>,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub vlan_id: Option<String>,
    pub vlan_name: Option<String>,
    pub input_errors: Option<i64>,
    pub output_errors: Option<i64>,
}

const DEVICE_COLUMNS: &str = "id, fqdn, ip_address, reachable, hardware, version, release, \
     software_image, serial, uptime, restarted, reload_reason, rommon";

fn device_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<DeviceRow> {
    Ok(DeviceRow {
        id: row.get(0)?,
        fqdn: row.get(1)?,
        ip_address: row.get(2)?,
        reachable: row.get(3)?,
        hardware: row.get(4)?,
        version: row.get(5)?,
        release: row.get(6)?,
        software_image: row.get(7)?,
        serial: row.get(8)?,
        uptime: row.get(9)?,
        restarted: row.get(10)?,
        reload_reason: row.get(11)?,
        rommon: row.get(12)?,
    })
}

impl NhStore {
    /// All known switches in inventory order
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row cannot be decoded.
    pub fn list_devices(&self) -> Result<Vec<DeviceRow>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM {} ORDER BY id", tables::SWITCHES);
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], device_from_row)?;
        let devices = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(devices)
    }

    /// Look up one switch by id
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails for a reason other than a missing row.
    pub fn get_device(&self, id: i64) -> Result<Option<DeviceRow>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM {} WHERE id = ?", tables::SWITCHES);
        let conn = self.lock_conn()?;
        match conn.query_row(&sql, [id], device_from_row) {
            Ok(device) => Ok(Some(device)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert newly discovered switches in one transaction, returning their ids
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails; nothing is inserted in that case.
    #[instrument(skip(self, devices), fields(count = devices.len()))]
    pub fn insert_devices(&self, devices: &[NewDevice]) -> Result<Vec<i64>, StoreError> {
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let sql = "INSERT INTO switches (fqdn, ip_address) VALUES (?, ?) RETURNING id";
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(devices.len());
        for device in devices {
            let id: i64 = tx
                .query_row(sql, duckdb::params![device.fqdn, device.ip_address], |row| {
                    row.get(0)
                })
                .map_err(|e| log_failed(sql, e))?;
            ids.push(id);
        }
        tx.commit()?;

        info!(inserted = ids.len(), "Inserted discovered switches");
        Ok(ids)
    }

    /// Record the latest probe result for a switch
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub fn set_reachable(&self, id: i64, reachable: bool) -> Result<(), StoreError> {
        let sql = "UPDATE switches SET reachable = ? WHERE id = ?";
        let conn = self.lock_conn()?;
        conn.execute(sql, duckdb::params![reachable, id])
            .map_err(|e| log_failed(sql, e))?;
        debug!(device_id = id, reachable, "Reachability recorded");
        Ok(())
    }

    /// Overwrite the version fields of a switch in place
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub fn update_version(&self, id: i64, info: &VersionInfo) -> Result<usize, StoreError> {
        let sql = "UPDATE switches SET hardware = ?, version = ?, release = ?, \
                   software_image = ?, serial = ?, uptime = ?, restarted = ?, \
                   reload_reason = ?, rommon = ? WHERE id = ?";
        let conn = self.lock_conn()?;
        let affected = conn
            .execute(
                sql,
                duckdb::params![
                    info.hardware,
                    info.version,
                    info.release,
                    info.software_image,
                    info.serial,
                    info.uptime,
                    info.restarted,
                    info.reload_reason,
                    info.rommon,
                    id
                ],
            )
            .map_err(|e| log_failed(sql, e))?;
        Ok(affected)
    }

    /// Reachability breakdown across the fleet
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn device_counts(&self) -> Result<DeviceCounts, StoreError> {
        let conn = self.lock_conn()?;
        let counts = conn.query_row(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE reachable), \
                    COUNT(*) FILTER (WHERE NOT reachable), \
                    COUNT(*) FILTER (WHERE reachable IS NULL) \
             FROM switches",
            [],
            |row| {
                Ok(DeviceCounts {
                    total: row.get(0)?,
                    reachable: row.get(1)?,
                    unreachable: row.get(2)?,
                    never_probed: row.get(3)?,
                })
            },
        )?;
        Ok(counts)
    }

    /// Connected trunk ports of a switch for a day, read from `interfaces_status`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub fn connected_trunk_ports(
        &self,
        device_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT interface FROM interfaces_status \
             WHERE switch_id = ? AND collected_on = CAST(? AS DATE) \
               AND status = 'connected' AND vlan_id LIKE '%trunk%' \
             ORDER BY interface",
        )?;
        let ports = stmt
            .query_map(duckdb::params![device_id, day_param(day)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ports)
    }

    /// Derived interface rows of a switch for a day
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or a row cannot be decoded.
    pub fn interfaces_for_device(
        &self,
        device_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<InterfaceView>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT interface, description, link_status, protocol_status, speed, duplex, \
                    mac_address, ip_address, vlan_id, vlan_name, input_errors, output_errors \
             FROM interfaces \
             WHERE switch_id = ? AND collected_on = CAST(? AS DATE) \
             ORDER BY interface",
        )?;
        let rows = stmt.query_map(duckdb::params![device_id, day_param(day)], |row| {
            Ok(InterfaceView {
                interface: row.get(0)?,
                description: row.get(1)?,
                link_status: row.get(2)?,
                protocol_status: row.get(3)?,
                speed: row.get(4)?,
                duplex: row.get(5)?,
                mac_address: row.get(6)?,
                ip_address: row.get(7)?,
                vlan_id: row.get(8)?,
                vlan_name: row.get(9)?,
                input_errors: row.get(10)?,
                output_errors: row.get(11)?,
            })
        })?;
        let views = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_device(fqdn: &str, ip: &str) -> NewDevice {
        NewDevice {
            fqdn: fqdn.to_string(),
            ip_address: Some(ip.to_string()),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_insert_and_list_devices() {
        let store = NhStore::open_memory().unwrap();
        let ids = store
            .insert_devices(&[
                new_device("sw-a.example.edu", "10.0.0.1"),
                new_device("sw-b.example.edu", "10.0.0.2"),
            ])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let devices = store.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].fqdn, "sw-a.example.edu");
        assert_eq!(devices[0].reachable, None);
        assert_eq!(devices[1].ip_address.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_get_device_missing() {
        let store = NhStore::open_memory().unwrap();
        assert!(store.get_device(42).unwrap().is_none());
    }

    #[test]
    fn test_set_reachable_and_counts() {
        let store = NhStore::open_memory().unwrap();
        let ids = store
            .insert_devices(&[
                new_device("a", "10.0.0.1"),
                new_device("b", "10.0.0.2"),
                new_device("c", "10.0.0.3"),
            ])
            .unwrap();
        store.set_reachable(ids[0], true).unwrap();
        store.set_reachable(ids[1], false).unwrap();

        let counts = store.device_counts().unwrap();
        assert_eq!(
            counts,
            DeviceCounts {
                total: 3,
                reachable: 1,
                unreachable: 1,
                never_probed: 1
            }
        );
        assert_eq!(store.get_device(ids[1]).unwrap().unwrap().reachable, Some(false));
    }

    #[test]
    fn test_update_version_in_place() {
        let store = NhStore::open_memory().unwrap();
        let id = store.insert_devices(&[new_device("a", "10.0.0.1")]).unwrap()[0];
        let info = VersionInfo {
            hardware: "C9300-48P".to_string(),
            version: "17.9.4a".to_string(),
            serial: "FOC1234X0AB".to_string(),
            // quotes are bound, not interpolated
            reload_reason: "Reload Command 'by admin'".to_string(),
            ..VersionInfo::default()
        };
        assert_eq!(store.update_version(id, &info).unwrap(), 1);

        let device = store.get_device(id).unwrap().unwrap();
        assert_eq!(device.hardware.as_deref(), Some("C9300-48P"));
        assert_eq!(device.reload_reason.as_deref(), Some("Reload Command 'by admin'"));
        assert_eq!(device.fqdn, "a");
    }

    #[test]
    fn test_connected_trunk_ports() {
        let store = NhStore::open_memory().unwrap();
        store
            .execute_batch(
                "INSERT INTO interfaces_status (switch_id, collected_on, interface, status, vlan_id) VALUES \
                 (1, DATE '2026-03-14', 'Gi1/0/49', 'connected', 'trunk'), \
                 (1, DATE '2026-03-14', 'Gi1/0/50', 'notconnect', 'trunk'), \
                 (1, DATE '2026-03-14', 'Gi1/0/1', 'connected', '10'), \
                 (2, DATE '2026-03-14', 'Gi1/0/48', 'connected', 'trunk')",
            )
            .unwrap();
        assert_eq!(
            store.connected_trunk_ports(1, day()).unwrap(),
            vec!["Gi1/0/49".to_string()]
        );
    }
}
