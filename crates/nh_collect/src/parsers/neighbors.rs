//! `show cdp neighbors` and `show lldp neighbors`

use super::short_interface_name;
use crate::records::NeighborRecord;

const CDP_FOOTER: &str = "Total cdp entries";
const LLDP_FOOTER: &str = "Total entries displayed";

/// Tokens like `Gig`, `Ten` or `Port` that are followed by a separate number
fn is_name_prefix(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

fn starts_with_digit(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
}

/// Parse a CDP detail row once the device id is known.
///
/// `fields` holds everything after the Device ID column: a two-token local
/// interface, the hold time, single-letter capabilities, the platform and a
/// one- or two-token port id.
fn cdp_record(device: String, fields: &[&str]) -> Option<NeighborRecord> {
    if fields.len() < 4 {
        return None;
    }
    let (local, rest) = if is_name_prefix(fields[0]) && starts_with_digit(fields[1]) {
        (format!("{}{}", fields[0], fields[1]), &fields[2..])
    } else {
        (fields[0].to_string(), &fields[1..])
    };

    let (holdtime, rest) = rest.split_first()?;
    holdtime.parse::<u32>().ok()?;

    let caps_len = rest.iter().take_while(|t| t.len() == 1).count();
    let (capabilities, rest) = rest.split_at(caps_len);
    if rest.is_empty() {
        return None;
    }

    let port_len = if rest.len() >= 2
        && starts_with_digit(rest[rest.len() - 1])
        && is_name_prefix(rest[rest.len() - 2])
    {
        2
    } else {
        1
    };
    let (platform, port) = rest.split_at(rest.len() - port_len);

    Some(NeighborRecord {
        local_interface: short_interface_name(&local),
        neighbor_name: device,
        neighbor_interface: port.join(" "),
        capabilities: capabilities.join(" "),
        platform: Some(platform.join(" ")),
    })
}

/// Parse `show cdp neighbors`. A device id too long for its column sits on
/// its own line and the detail follows on the next, indented line.
#[must_use]
pub fn parse_cdp_neighbors(raw: &str) -> Vec<NeighborRecord> {
    let mut in_table = false;
    let mut pending: Option<String> = None;
    let mut records = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end();
        if line.starts_with("Device ID") {
            in_table = true;
            continue;
        }
        if !in_table || line.trim().is_empty() {
            continue;
        }
        if line.starts_with(CDP_FOOTER) {
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if line.starts_with(char::is_whitespace) {
            if let Some(device) = pending.take()
                && let Some(record) = cdp_record(device, &tokens)
            {
                records.push(record);
            }
        } else if tokens.len() == 1 {
            pending = Some(tokens[0].to_string());
        } else {
            pending = None;
            if let Some(record) = cdp_record(tokens[0].to_string(), &tokens[1..]) {
                records.push(record);
            }
        }
    }
    records
}

/// Parse `show lldp neighbors`. The Device ID column is sliced by the header
/// offset of `Local Intf`; the capability column may be blank.
#[must_use]
pub fn parse_lldp_neighbors(raw: &str) -> Vec<NeighborRecord> {
    let mut local_offset: Option<usize> = None;
    let mut records = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end();
        if line.starts_with("Device ID") {
            local_offset = line.find("Local Intf");
            continue;
        }
        let Some(offset) = local_offset else {
            continue;
        };
        if line.starts_with(LLDP_FOOTER) {
            break;
        }

        let Some(device) = line.get(..offset).map(str::trim) else {
            continue;
        };
        let Some(rest) = line.get(offset..) else {
            continue;
        };
        if device.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (local, capabilities, port) = match tokens.as_slice() {
            [local, hold, port] if hold.parse::<u32>().is_ok() => (*local, "", port.to_string()),
            [local, hold, caps, port @ ..] if hold.parse::<u32>().is_ok() => {
                (*local, *caps, port.join(" "))
            }
            _ => continue,
        };

        records.push(NeighborRecord {
            local_interface: short_interface_name(local),
            neighbor_name: device.to_string(),
            neighbor_interface: port,
            capabilities: capabilities.to_string(),
            platform: None,
        });
    }
    records
}
