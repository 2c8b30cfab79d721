//! `show vlan brief`

use crate::records::VlanRecord;
use regex::Regex;
use std::sync::LazyLock;

static VLAN_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(\S+)\s+(\S+)\s*(.*)$").expect("Invalid VLAN row regex")
});

fn split_ports(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .map(str::to_string)
}

/// Parse VLAN rows. Indented lines continue the previous VLAN's port list.
#[must_use]
pub fn parse_vlan_brief(raw: &str) -> Vec<VlanRecord> {
    let mut vlans: Vec<VlanRecord> = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end();
        if let Some(caps) = VLAN_ROW.captures(line) {
            vlans.push(VlanRecord {
                vlan_id: caps[1].to_string(),
                name: caps[2].to_string(),
                status: caps[3].to_string(),
                ports: split_ports(&caps[4]).collect(),
            });
        } else if line.starts_with(char::is_whitespace)
            && let Some(last) = vlans.last_mut()
        {
            last.ports.extend(split_ports(line));
        }
    }
    vlans
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active    Gi1/0/2, Gi1/0/3
10   STAFF                            active    Gi1/0/1, Gi1/0/4, Gi1/0/5
                                                Gi1/0/6, Gi1/0/7
20   PRINTERS                         act/lshut
1002 fddi-default                     act/unsup
";

    #[test]
    fn test_rows_and_continuations() {
        let vlans = parse_vlan_brief(SAMPLE);
        assert_eq!(vlans.len(), 4);
        assert_eq!(vlans[0].vlan_id, "1");
        assert_eq!(vlans[0].ports, ["Gi1/0/2", "Gi1/0/3"]);
        assert_eq!(vlans[1].name, "STAFF");
        assert_eq!(
            vlans[1].ports,
            ["Gi1/0/1", "Gi1/0/4", "Gi1/0/5", "Gi1/0/6", "Gi1/0/7"]
        );
    }

    #[test]
    fn test_vlan_without_ports() {
        let vlans = parse_vlan_brief(SAMPLE);
        assert_eq!(vlans[2].status, "act/lshut");
        assert!(vlans[2].ports.is_empty());
        assert_eq!(vlans[3].vlan_id, "1002");
    }

    #[test]
    fn test_header_and_noise_ignored() {
        assert!(parse_vlan_brief("VLAN Name Status Ports\n----\n% Invalid input\n").is_empty());
    }
}
