//! `show interfaces status`
//!
//! The Name column is free text, so it is sliced by the header's column
//! offsets. Everything from the Status column onwards is whitespace-separated
//! except Type, which keeps its inner spaces.

use crate::records::InterfaceStatusRecord;

struct Columns {
    name: usize,
    status: usize,
}

fn header_columns(line: &str) -> Option<Columns> {
    if !line.starts_with("Port") {
        return None;
    }
    Some(Columns {
        name: line.find("Name")?,
        status: line.find("Status")?,
    })
}

fn parse_row(line: &str, cols: &Columns) -> Option<InterfaceStatusRecord> {
    let interface = line.split_whitespace().next()?.to_string();
    let description = line
        .get(cols.name..cols.status)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let rest = line.get(cols.status..)?;
    let mut tokens = rest.split_whitespace();
    let status = tokens.next()?.to_string();
    let vlan_id = tokens.next()?.to_string();
    let duplex = tokens.next()?.to_string();
    let speed = tokens.next()?.to_string();
    let port_type = tokens.collect::<Vec<_>>().join(" ");

    Some(InterfaceStatusRecord {
        interface,
        description,
        status,
        vlan_id,
        duplex,
        speed,
        port_type,
    })
}

/// Parse the port table. Rows before the header, and rows too short to
/// reach the Speed column, are dropped.
#[must_use]
pub fn parse_interfaces_status(raw: &str) -> Vec<InterfaceStatusRecord> {
    let mut columns: Option<Columns> = None;
    let mut records = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if let Some(found) = header_columns(line) {
            columns = Some(found);
            continue;
        }
        if let Some(cols) = &columns
            && let Some(record) = parse_row(line, cols)
        {
            records.push(record);
        }
    }
    records
}
