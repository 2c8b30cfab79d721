//! Snapshot records produced by the parsers.
//!
//! Field order of each [`SnapshotRow`] impl follows the target table's
//! column list; the writer binds `switch_id` and `collected_on` itself.

use nh_store::{SnapshotRow, SqlValue};
use serde::{Deserialize, Serialize};

/// One block of `show interfaces`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub interface: String,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub link_status: Option<String>,
    pub protocol_status: Option<String>,
    pub hardware_type: Option<String>,
    pub reliability: Option<String>,
    pub txload: Option<String>,
    pub rxload: Option<String>,
    pub mtu: Option<i64>,
    pub duplex: Option<String>,
    pub speed: Option<String>,
    pub media_type: Option<String>,
    pub bandwidth: Option<String>,
    pub delay: Option<String>,
    pub encapsulation: Option<String>,
    pub last_input: Option<String>,
    pub last_output: Option<String>,
    pub last_output_hang: Option<String>,
    pub queue_strategy: Option<String>,
    pub input_rate: Option<i64>,
    pub output_rate: Option<i64>,
    pub input_packets: Option<i64>,
    pub output_packets: Option<i64>,
    pub runts: Option<i64>,
    pub giants: Option<i64>,
    pub throttles: Option<i64>,
    pub input_errors: Option<i64>,
    pub output_errors: Option<i64>,
    pub crc_errors: Option<i64>,
    pub collisions: Option<i64>,
}

impl SnapshotRow for InterfaceRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            (&self.description).into(),
            (&self.ip_address).into(),
            (&self.link_status).into(),
            (&self.protocol_status).into(),
            (&self.hardware_type).into(),
            (&self.reliability).into(),
            (&self.txload).into(),
            (&self.rxload).into(),
            self.mtu.into(),
            (&self.duplex).into(),
            (&self.speed).into(),
            (&self.media_type).into(),
            (&self.bandwidth).into(),
            (&self.delay).into(),
            (&self.encapsulation).into(),
            (&self.last_input).into(),
            (&self.last_output).into(),
            (&self.last_output_hang).into(),
            (&self.queue_strategy).into(),
            self.input_rate.into(),
            self.output_rate.into(),
            self.input_packets.into(),
            self.output_packets.into(),
            self.runts.into(),
            self.giants.into(),
            self.throttles.into(),
            self.input_errors.into(),
            self.output_errors.into(),
            self.crc_errors.into(),
            self.collisions.into(),
        ]
    }
}

/// One row of `show interfaces status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStatusRecord {
    pub interface: String,
    pub description: String,
    pub status: String,
    pub vlan_id: String,
    pub duplex: String,
    pub speed: String,
    pub port_type: String,
}

impl InterfaceStatusRecord {
    /// A connected port carrying tagged traffic
    #[must_use]
    pub fn is_connected_trunk(&self) -> bool {
        self.status == "connected" && self.vlan_id.contains("trunk")
    }
}

impl SnapshotRow for InterfaceStatusRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            (&self.description).into(),
            (&self.status).into(),
            (&self.vlan_id).into(),
            (&self.duplex).into(),
            (&self.speed).into(),
            (&self.port_type).into(),
        ]
    }
}

/// One VLAN of `show vlan brief`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    pub vlan_id: String,
    pub name: String,
    pub status: String,
    pub ports: Vec<String>,
}

impl SnapshotRow for VlanRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.vlan_id).into(),
            (&self.name).into(),
            (&self.status).into(),
            self.ports.join(",").into(),
        ]
    }
}

/// A CDP or LLDP neighbor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub local_interface: String,
    pub neighbor_name: String,
    pub neighbor_interface: String,
    pub capabilities: String,
    /// CDP only
    pub platform: Option<String>,
}

impl SnapshotRow for NeighborRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.local_interface).into(),
            (&self.neighbor_name).into(),
            (&self.neighbor_interface).into(),
            (&self.capabilities).into(),
            (&self.platform).into(),
        ]
    }
}

/// One learned MAC address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacAddressEntry {
    pub interface: String,
    pub mac_address: String,
    pub vlan_id: String,
    pub entry_type: String,
}

impl SnapshotRow for MacAddressEntry {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            (&self.mac_address).into(),
            (&self.vlan_id).into(),
            (&self.entry_type).into(),
        ]
    }
}

/// PoE budget of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerModuleRecord {
    pub module: String,
    pub available: String,
    pub used: String,
    pub remaining: String,
}

impl SnapshotRow for PowerModuleRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.module).into(),
            (&self.available).into(),
            (&self.used).into(),
            (&self.remaining).into(),
        ]
    }
}

/// PoE state of one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerInterfaceRecord {
    pub interface: String,
    pub admin: String,
    pub oper: String,
    pub power: String,
    pub device: String,
    pub class: String,
    pub max: String,
}

impl SnapshotRow for PowerInterfaceRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            (&self.admin).into(),
            (&self.oper).into(),
            (&self.power).into(),
            (&self.device).into(),
            (&self.class).into(),
            (&self.max).into(),
        ]
    }
}

/// Both tables of `show power inline`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerInline {
    pub modules: Vec<PowerModuleRecord>,
    pub interfaces: Vec<PowerInterfaceRecord>,
}

/// The configuration block of one interface, `interface <name>` line first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningConfigBlock {
    pub interface: String,
    pub config_lines: Vec<String>,
}

impl SnapshotRow for RunningConfigBlock {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            self.config_lines.join("\n").into(),
        ]
    }
}

/// Operational status age of one interface from the telemetry source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceUsageRecord {
    pub interface: String,
    pub status: String,
    pub last_change: String,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl SnapshotRow for InterfaceUsageRecord {
    fn row_values(&self) -> Vec<SqlValue> {
        vec![
            (&self.interface).into(),
            (&self.status).into(),
            (&self.last_change).into(),
            self.days.into(),
            self.hours.into(),
            self.minutes.into(),
        ]
    }
}
