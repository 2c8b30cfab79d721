//! Parsers for IOS command output.
//!
//! Every parser is a pure function of the raw text. Malformed lines are
//! skipped; none of them panic on unexpected input.

use thiserror::Error;

pub mod interfaces;
pub mod interfaces_status;
pub mod mac_table;
pub mod neighbors;
pub mod power_inline;
pub mod running_config;
pub mod version;
pub mod vlan;

pub use interfaces::parse_interfaces;
pub use interfaces_status::parse_interfaces_status;
pub use mac_table::parse_mac_address_table;
pub use neighbors::{parse_cdp_neighbors, parse_lldp_neighbors};
pub use power_inline::parse_power_inline;
pub use running_config::parse_interface_config;
pub use version::parse_version;
pub use vlan::parse_vlan_brief;

/// Parser errors ("not applicable" results, never transport failures)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no interface blocks found")]
    NoInterfaces,
}

const INTERFACE_PREFIXES: &[(&str, &str)] = &[
    ("TwentyFiveGigE", "Twe"),
    ("TwoGigabitEthernet", "Tw"),
    ("FiveGigabitEthernet", "Fi"),
    ("TenGigabitEthernet", "Te"),
    ("FortyGigabitEthernet", "Fo"),
    ("HundredGigE", "Hu"),
    ("AppGigabitEthernet", "Ap"),
    ("GigabitEthernet", "Gi"),
    ("FastEthernet", "Fa"),
    ("Port-channel", "Po"),
    ("Ethernet", "Eth"),
    ("Loopback", "Lo"),
    ("Tunnel", "Tu"),
    ("Gig", "Gi"),
    ("Ten", "Te"),
    ("Fas", "Fa"),
    ("Twe", "Twe"),
    ("For", "Fo"),
    ("Hun", "Hu"),
];

/// Abbreviate an interface name the way status and MAC tables print it.
///
/// `GigabitEthernet1/0/1` and `Gig 1/0/1` both become `Gi1/0/1`; names without
/// a known prefix (`Vlan10`, `Gi1/0/1`) are returned unchanged.
#[must_use]
pub fn short_interface_name(name: &str) -> String {
    let compact: String = name.split_whitespace().collect();
    for (long, short) in INTERFACE_PREFIXES {
        if let Some(rest) = compact.strip_prefix(long)
            && rest.starts_with(|c: char| c.is_ascii_digit())
        {
            return format!("{short}{rest}");
        }
    }
    compact
}
