//! `show power inline`

use crate::records::{PowerInline, PowerInterfaceRecord, PowerModuleRecord};

fn is_number(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

fn module_row(tokens: &[&str]) -> Option<PowerModuleRecord> {
    match tokens {
        [module, available, used, remaining]
            if [available, used, remaining].iter().all(|t| is_number(t)) =>
        {
            Some(PowerModuleRecord {
                module: module.to_string(),
                available: available.to_string(),
                used: used.to_string(),
                remaining: remaining.to_string(),
            })
        }
        _ => None,
    }
}

/// Device names may contain spaces; they sit between Power and the last
/// two columns.
fn interface_row(tokens: &[&str]) -> Option<PowerInterfaceRecord> {
    if tokens.len() < 7 || !is_number(tokens[3]) {
        return None;
    }
    let n = tokens.len();
    Some(PowerInterfaceRecord {
        interface: tokens[0].to_string(),
        admin: tokens[1].to_string(),
        oper: tokens[2].to_string(),
        power: tokens[3].to_string(),
        device: tokens[4..n - 2].join(" "),
        class: tokens[n - 2].to_string(),
        max: tokens[n - 1].to_string(),
    })
}

/// Parse the module budget table and the per-port table.
#[must_use]
pub fn parse_power_inline(raw: &str) -> PowerInline {
    let mut parsed = PowerInline::default();
    for line in raw.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some(module) = module_row(&tokens) {
            parsed.modules.push(module);
        } else if let Some(port) = interface_row(&tokens) {
            parsed.interfaces.push(port);
        }
    }
    parsed
}
