//! Cross-table refresh joins that backfill derived `interfaces` columns.
//!
//! Each join touches only `interfaces` rows of the given day, optionally
//! narrowed to one device.

use crate::{NhStore, SqlValue, StoreError, day_param, log_failed};
use chrono::NaiveDate;
use tracing::{info, instrument};

/// Which devices a refresh join updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    AllDevices,
    Device(i64),
}

impl RefreshScope {
    /// Extra predicate on `interfaces` plus the parameters it binds after the day
    fn device_filter(self) -> (&'static str, Vec<SqlValue>) {
        match self {
            RefreshScope::AllDevices => ("", Vec::new()),
            RefreshScope::Device(id) => (" AND interfaces.switch_id = ?", vec![SqlValue::Int(id)]),
        }
    }
}

impl NhStore {
    fn run_refresh(
        &self,
        name: &'static str,
        sql: &str,
        mut params: Vec<SqlValue>,
        scope: RefreshScope,
    ) -> Result<usize, StoreError> {
        let (_, scope_params) = scope.device_filter();
        params.extend(scope_params);
        let conn = self.lock_conn()?;
        let updated = conn
            .execute(sql, duckdb::params_from_iter(params.iter()))
            .map_err(|e| log_failed(sql, e))?;
        info!(refresh = name, updated, ?scope, "Refresh join applied");
        Ok(updated)
    }

    /// Set `interfaces.mac_address` to the lowest MAC learned on the port that day
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    #[instrument(skip(self))]
    pub fn refresh_mac_addresses(
        &self,
        scope: RefreshScope,
        day: NaiveDate,
    ) -> Result<usize, StoreError> {
        let (filter, _) = scope.device_filter();
        let sql = format!(
            "UPDATE interfaces SET mac_address = m.mac_address \
             FROM (SELECT switch_id, interface, collected_on, MIN(mac_address) AS mac_address \
                   FROM mac_address_table \
                   WHERE collected_on = CAST(? AS DATE) \
                   GROUP BY switch_id, interface, collected_on) AS m \
             WHERE interfaces.switch_id = m.switch_id \
               AND interfaces.interface = m.interface \
               AND interfaces.collected_on = m.collected_on{filter}"
        );
        self.run_refresh("mac_address", &sql, vec![day_param(day).into()], scope)
    }

    /// Set `interfaces.ip_address` from the ARP table by MAC
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    #[instrument(skip(self))]
    pub fn refresh_ip_addresses(
        &self,
        scope: RefreshScope,
        day: NaiveDate,
    ) -> Result<usize, StoreError> {
        let (filter, _) = scope.device_filter();
        let sql = format!(
            "UPDATE interfaces SET ip_address = a.ip_address \
             FROM (SELECT mac_address, arg_max(ip_address, updated_at) AS ip_address \
                   FROM arp_table GROUP BY mac_address) AS a \
             WHERE interfaces.mac_address = a.mac_address \
               AND interfaces.collected_on = CAST(? AS DATE){filter}"
        );
        self.run_refresh("ip_address", &sql, vec![day_param(day).into()], scope)
    }

    /// Set `interfaces.vlan_id` from the same day's `interfaces_status`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    #[instrument(skip(self))]
    pub fn refresh_vlan_ids(
        &self,
        scope: RefreshScope,
        day: NaiveDate,
    ) -> Result<usize, StoreError> {
        let (filter, _) = scope.device_filter();
        let sql = format!(
            "UPDATE interfaces SET vlan_id = s.vlan_id \
             FROM interfaces_status AS s \
             WHERE interfaces.switch_id = s.switch_id \
               AND interfaces.interface = s.interface \
               AND interfaces.collected_on = s.collected_on \
               AND interfaces.collected_on = CAST(? AS DATE){filter}"
        );
        self.run_refresh("vlan_id", &sql, vec![day_param(day).into()], scope)
    }

    /// Set `interfaces.vlan_name` from the same day's `vlans`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    #[instrument(skip(self))]
    pub fn refresh_vlan_names(
        &self,
        scope: RefreshScope,
        day: NaiveDate,
    ) -> Result<usize, StoreError> {
        let (filter, _) = scope.device_filter();
        let sql = format!(
            "UPDATE interfaces SET vlan_name = v.vlan_name \
             FROM vlans AS v \
             WHERE interfaces.switch_id = v.switch_id \
               AND interfaces.vlan_id = v.vlan_id \
               AND interfaces.collected_on = v.collected_on \
               AND interfaces.collected_on = CAST(? AS DATE){filter}"
        );
        self.run_refresh("vlan_name", &sql, vec![day_param(day).into()], scope)
    }
}
