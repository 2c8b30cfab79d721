//! Schema definitions and constants

/// Table names
pub mod tables {
    pub const SWITCHES: &str = "switches";
    pub const INTERFACES: &str = "interfaces";
    pub const INTERFACES_STATUS: &str = "interfaces_status";
    pub const VLANS: &str = "vlans";
    pub const CDP_NEIGHBORS: &str = "cdp_neighbors";
    pub const LLDP_NEIGHBORS: &str = "lldp_neighbors";
    pub const MAC_ADDRESS_TABLE: &str = "mac_address_table";
    pub const POWER_MODULES: &str = "power_modules";
    pub const POWER_INTERFACES: &str = "power_interfaces";
    pub const SHOW_RUNNING_CONFIG: &str = "show_running_config";
    pub const AKIPS_INTERFACE_USAGE: &str = "akips_interface_usage";
    pub const ARP_TABLE: &str = "arp_table";
    pub const HARVEST_LOCK: &str = "harvest_lock";
    pub const HARVEST_RUNS: &str = "harvest_runs";
}

/// Common column names
pub mod columns {
    pub const SWITCH_ID: &str = "switch_id";
    pub const COLLECTED_ON: &str = "collected_on";
    pub const INTERFACE: &str = "interface";
    pub const MAC_ADDRESS: &str = "mac_address";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const VLAN_ID: &str = "vlan_id";
    pub const VLAN_NAME: &str = "vlan_name";
}

/// `chrono` format used to bind a collection day
pub const DAY_FORMAT: &str = "%Y-%m-%d";

const INTERFACES_COLUMNS: &[&str] = &[
    "interface",
    "description",
    "ip_address",
    "link_status",
    "protocol_status",
    "hardware_type",
    "reliability",
    "txload",
    "rxload",
    "mtu",
    "duplex",
    "speed",
    "media_type",
    "bandwidth",
    "delay",
    "encapsulation",
    "last_input",
    "last_output",
    "last_output_hang",
    "queue_strategy",
    "input_rate",
    "output_rate",
    "input_packets",
    "output_packets",
    "runts",
    "giants",
    "throttles",
    "input_errors",
    "output_errors",
    "crc_errors",
    "collisions",
];

const INTERFACES_STATUS_COLUMNS: &[&str] = &[
    "interface",
    "description",
    "status",
    "vlan_id",
    "duplex",
    "speed",
    "type",
];

const VLANS_COLUMNS: &[&str] = &["vlan_id", "vlan_name", "status", "interfaces"];

const NEIGHBOR_COLUMNS: &[&str] = &[
    "interface",
    "neighbor_name",
    "neighbor_interface",
    "capabilities",
    "platform",
];

const MAC_ADDRESS_COLUMNS: &[&str] = &["interface", "mac_address", "vlan_id", "type"];

const POWER_MODULES_COLUMNS: &[&str] = &["module", "available", "used", "remaining"];

const POWER_INTERFACES_COLUMNS: &[&str] = &[
    "interface",
    "admin",
    "oper",
    "power",
    "device",
    "class",
    "max",
];

const RUNNING_CONFIG_COLUMNS: &[&str] = &["interface", "configuration"];

const INTERFACE_USAGE_COLUMNS: &[&str] = &[
    "interface",
    "status",
    "last_change",
    "days",
    "hours",
    "minutes",
];

/// How a snapshot table is sliced when a device's rows are replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayScope {
    /// One slice per (device, day); earlier days are kept
    Daily,
    /// Only the latest slice per device is kept
    Latest,
}

/// Closed set of snapshot tables the writer may touch.
///
/// Every snapshot table also carries `switch_id` and `collected_on`; those two
/// are bound by the writer and are not part of [`Table::columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Interfaces,
    InterfacesStatus,
    Vlans,
    CdpNeighbors,
    LldpNeighbors,
    MacAddressTable,
    PowerModules,
    PowerInterfaces,
    RunningConfig,
    InterfaceUsage,
}

impl Table {
    pub const ALL: [Table; 10] = [
        Table::Interfaces,
        Table::InterfacesStatus,
        Table::Vlans,
        Table::CdpNeighbors,
        Table::LldpNeighbors,
        Table::MacAddressTable,
        Table::PowerModules,
        Table::PowerInterfaces,
        Table::RunningConfig,
        Table::InterfaceUsage,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Table::Interfaces => tables::INTERFACES,
            Table::InterfacesStatus => tables::INTERFACES_STATUS,
            Table::Vlans => tables::VLANS,
            Table::CdpNeighbors => tables::CDP_NEIGHBORS,
            Table::LldpNeighbors => tables::LLDP_NEIGHBORS,
            Table::MacAddressTable => tables::MAC_ADDRESS_TABLE,
            Table::PowerModules => tables::POWER_MODULES,
            Table::PowerInterfaces => tables::POWER_INTERFACES,
            Table::RunningConfig => tables::SHOW_RUNNING_CONFIG,
            Table::InterfaceUsage => tables::AKIPS_INTERFACE_USAGE,
        }
    }

    /// Record columns in bind order
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Interfaces => INTERFACES_COLUMNS,
            Table::InterfacesStatus => INTERFACES_STATUS_COLUMNS,
            Table::Vlans => VLANS_COLUMNS,
            Table::CdpNeighbors | Table::LldpNeighbors => NEIGHBOR_COLUMNS,
            Table::MacAddressTable => MAC_ADDRESS_COLUMNS,
            Table::PowerModules => POWER_MODULES_COLUMNS,
            Table::PowerInterfaces => POWER_INTERFACES_COLUMNS,
            Table::RunningConfig => RUNNING_CONFIG_COLUMNS,
            Table::InterfaceUsage => INTERFACE_USAGE_COLUMNS,
        }
    }

    #[must_use]
    pub fn day_scope(&self) -> DayScope {
        match self {
            Table::Interfaces
            | Table::Vlans
            | Table::CdpNeighbors
            | Table::LldpNeighbors
            | Table::MacAddressTable => DayScope::Daily,
            Table::InterfacesStatus
            | Table::PowerModules
            | Table::PowerInterfaces
            | Table::RunningConfig
            | Table::InterfaceUsage => DayScope::Latest,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Double-quote an identifier for generated SQL
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<&str> = Table::ALL.iter().map(Table::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Table::ALL.len());
    }

    #[test]
    fn test_interfaces_column_count() {
        // switch_id and collected_on are bound separately
        assert_eq!(Table::Interfaces.columns().len(), 31);
        assert_eq!(Table::Interfaces.columns()[0], columns::INTERFACE);
    }

    #[test]
    fn test_day_scope() {
        assert_eq!(Table::MacAddressTable.day_scope(), DayScope::Daily);
        assert_eq!(Table::InterfaceUsage.day_scope(), DayScope::Latest);
        assert_eq!(Table::InterfacesStatus.day_scope(), DayScope::Latest);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("type"), "\"type\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
