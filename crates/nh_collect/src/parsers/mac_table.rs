//! `show mac address-table`

use crate::records::MacAddressEntry;
use regex::Regex;
use std::sync::LazyLock;

/// Lines containing any of these are headers, footers or CPU entries
const SKIP_MARKERS: &[&str] = &[
    "Mac Address Table",
    "Vlan",
    "----",
    "Total Mac Addresses",
    "CPU",
];

static MAC_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*?\s*(\d+)\s+([\w.:]+)\s+(\w+)(?:\s+[\w-])*\s+(\S+)")
        .expect("Invalid MAC entry regex")
});

/// Parse MAC table rows; lines that do not match are dropped.
#[must_use]
pub fn parse_mac_address_table(raw: &str) -> Vec<MacAddressEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !SKIP_MARKERS.iter().any(|marker| line.contains(marker)))
        .filter_map(|line| {
            let caps = MAC_ENTRY.captures(line)?;
            Some(MacAddressEntry {
                vlan_id: caps[1].to_string(),
                mac_address: caps[2].to_string(),
                entry_type: caps[3].to_string(),
                interface: caps[4].to_string(),
            })
        })
        .collect()
}
