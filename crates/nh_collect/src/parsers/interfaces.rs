//! `show interfaces`

use super::short_interface_name;
use crate::records::InterfaceRecord;
use regex::Regex;
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) is (.+?), line protocol is (\S+)").expect("Invalid interface header regex")
});
static HARDWARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Hardware is ([^,]+)").expect("Invalid hardware regex"));
static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Description: (.+)$").expect("Invalid description regex"));
static INTERNET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Internet address is (\S+)").expect("Invalid internet address regex")
});
static MTU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"MTU (\d+) bytes, BW ([^,]+), DLY ([^,]+),").expect("Invalid MTU regex")
});
static LOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"reliability (\S+), txload (\S+), rxload (\S+)").expect("Invalid load regex")
});
static ENCAPSULATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Encapsulation ([^,]+)").expect("Invalid encapsulation regex")
});
static DUPLEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)-duplex, ([^,]+),(?: link type is [^,]+,)? media type is (.+)$")
        .expect("Invalid duplex regex")
});
static LAST_IO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Last input ([^,]+), output ([^,]+), output hang (.+)$")
        .expect("Invalid last input regex")
});
static QUEUEING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Queueing strategy: (.+)$").expect("Invalid queueing regex")
});
static INPUT_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"input rate (\d+) bits/sec").expect("Invalid input rate regex")
});
static OUTPUT_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"output rate (\d+) bits/sec").expect("Invalid output rate regex")
});
static PACKETS_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+) packets input").expect("Invalid packets input regex")
});
static PACKETS_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+) packets output").expect("Invalid packets output regex")
});
static RUNTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) runts, (\d+) giants, (\d+) throttles").expect("Invalid runts regex")
});
static INPUT_ERRORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+) input errors, (\d+) CRC").expect("Invalid input errors regex")
});
static OUTPUT_ERRORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+) output errors, (\d+) collisions").expect("Invalid output errors regex")
});

fn text(caps: &regex::Captures<'_>, group: usize) -> Option<String> {
    caps.get(group).map(|m| m.as_str().trim().to_string())
}

fn number(caps: &regex::Captures<'_>, group: usize) -> Option<i64> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

/// Apply one indented detail line to the open record
fn apply_detail(record: &mut InterfaceRecord, line: &str) {
    if let Some(caps) = DESCRIPTION.captures(line) {
        record.description = text(&caps, 1);
        return;
    }
    if let Some(caps) = HARDWARE.captures(line) {
        record.hardware_type = text(&caps, 1);
    }
    if let Some(caps) = INTERNET.captures(line) {
        record.ip_address = text(&caps, 1);
    }
    if let Some(caps) = MTU.captures(line) {
        record.mtu = number(&caps, 1);
        record.bandwidth = text(&caps, 2);
        record.delay = text(&caps, 3);
    }
    if let Some(caps) = LOAD.captures(line) {
        record.reliability = text(&caps, 1);
        record.txload = text(&caps, 2);
        record.rxload = text(&caps, 3);
    }
    if let Some(caps) = ENCAPSULATION.captures(line) {
        record.encapsulation = text(&caps, 1);
    }
    if let Some(caps) = DUPLEX.captures(line) {
        record.duplex = text(&caps, 1);
        record.speed = text(&caps, 2);
        record.media_type = text(&caps, 3);
    }
    if let Some(caps) = LAST_IO.captures(line) {
        record.last_input = text(&caps, 1);
        record.last_output = text(&caps, 2);
        record.last_output_hang = text(&caps, 3);
    }
    if let Some(caps) = QUEUEING.captures(line) {
        record.queue_strategy = text(&caps, 1);
    }
    if let Some(caps) = INPUT_RATE.captures(line) {
        record.input_rate = number(&caps, 1);
    }
    if let Some(caps) = OUTPUT_RATE.captures(line) {
        record.output_rate = number(&caps, 1);
    }
    if let Some(caps) = PACKETS_INPUT.captures(line) {
        record.input_packets = number(&caps, 1);
    }
    if let Some(caps) = PACKETS_OUTPUT.captures(line) {
        record.output_packets = number(&caps, 1);
    }
    if let Some(caps) = RUNTS.captures(line) {
        record.runts = number(&caps, 1);
        record.giants = number(&caps, 2);
        record.throttles = number(&caps, 3);
    }
    if let Some(caps) = INPUT_ERRORS.captures(line) {
        record.input_errors = number(&caps, 1);
        record.crc_errors = number(&caps, 2);
    }
    if let Some(caps) = OUTPUT_ERRORS.captures(line) {
        record.output_errors = number(&caps, 1);
        record.collisions = number(&caps, 2);
    }
}

/// Parse every interface block. Interface names are abbreviated so they join
/// against `show interfaces status` and the MAC table.
#[must_use]
pub fn parse_interfaces(raw: &str) -> Vec<InterfaceRecord> {
    let mut records = Vec::new();
    let mut current: Option<InterfaceRecord> = None;

    for line in raw.lines() {
        let starts_block = !line.starts_with(char::is_whitespace);
        if starts_block && let Some(caps) = HEADER.captures(line.trim_end()) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(InterfaceRecord {
                interface: short_interface_name(&caps[1]),
                link_status: text(&caps, 2),
                protocol_status: text(&caps, 3),
                ..InterfaceRecord::default()
            });
            continue;
        }

        if let Some(record) = current.as_mut() {
            apply_detail(record, line.trim());
        }
    }

    if let Some(done) = current {
        records.push(done);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
GigabitEthernet1/0/1 is up, line protocol is up (connected)
  Hardware is Gigabit Ethernet, address is 00aa.bbcc.0101 (bia 00aa.bbcc.0101)
  Description: Staff desk 101
  MTU 1500 bytes, BW 1000000 Kbit/sec, DLY 10 usec,
     reliability 255/255, txload 1/255, rxload 1/255
  Encapsulation ARPA, loopback not set
  Keepalive set (10 sec)
  Full-duplex, 1000Mb/s, media type is 10/100/1000BaseTX
  input flow-control is on, output flow-control is unsupported
  ARP type: ARPA, ARP Timeout 04:00:00
  Last input 00:00:01, output 00:00:00, output hang never
  Last clearing of \"show interface\" counters never
  Input queue: 0/2000/0/0 (size/max/drops/flushes); Total output drops: 0
  Queueing strategy: fifo
  Output queue: 0/40 (size/max)
  5 minute input rate 2000 bits/sec, 3 packets/sec
  5 minute output rate 41000 bits/sec, 45 packets/sec
     1234567 packets input, 234567890 bytes, 0 no buffer
     Received 1234 broadcasts (1200 multicasts)
     3 runts, 0 giants, 0 throttles
     7 input errors, 2 CRC, 0 frame, 0 overrun, 0 ignored
     7654321 packets output, 987654321 bytes, 0 underruns
     0 output errors, 0 collisions, 1 interface resets
GigabitEthernet1/0/2 is administratively down, line protocol is down (disabled)
  Hardware is Gigabit Ethernet, address is 00aa.bbcc.0102 (bia 00aa.bbcc.0102)
  MTU 1500 bytes, BW 10000 Kbit/sec, DLY 1000 usec,
  Auto-duplex, Auto-speed, media type is 10/100/1000BaseTX
Vlan10 is up, line protocol is up
  Hardware is Ethernet SVI, address is 00aa.bbcc.0001 (bia 00aa.bbcc.0001)
  Internet address is 10.10.0.2/24
";

    #[test]
    fn test_blocks() {
        let records = parse_interfaces(SAMPLE);
        assert_eq!(records.len(), 3);
        let names: Vec<&str> = records.iter().map(|r| r.interface.as_str()).collect();
        assert_eq!(names, ["Gi1/0/1", "Gi1/0/2", "Vlan10"]);
    }

    #[test]
    fn test_detail_fields() {
        let gi1 = &parse_interfaces(SAMPLE)[0];
        assert_eq!(gi1.link_status.as_deref(), Some("up"));
        assert_eq!(gi1.protocol_status.as_deref(), Some("up"));
        assert_eq!(gi1.description.as_deref(), Some("Staff desk 101"));
        assert_eq!(gi1.hardware_type.as_deref(), Some("Gigabit Ethernet"));
        assert_eq!(gi1.mtu, Some(1500));
        assert_eq!(gi1.bandwidth.as_deref(), Some("1000000 Kbit/sec"));
        assert_eq!(gi1.delay.as_deref(), Some("10 usec"));
        assert_eq!(gi1.reliability.as_deref(), Some("255/255"));
        assert_eq!(gi1.rxload.as_deref(), Some("1/255"));
        assert_eq!(gi1.encapsulation.as_deref(), Some("ARPA"));
        assert_eq!(gi1.duplex.as_deref(), Some("Full"));
        assert_eq!(gi1.speed.as_deref(), Some("1000Mb/s"));
        assert_eq!(gi1.media_type.as_deref(), Some("10/100/1000BaseTX"));
        assert_eq!(gi1.last_input.as_deref(), Some("00:00:01"));
        assert_eq!(gi1.last_output_hang.as_deref(), Some("never"));
        assert_eq!(gi1.queue_strategy.as_deref(), Some("fifo"));
        assert_eq!(gi1.input_rate, Some(2000));
        assert_eq!(gi1.output_rate, Some(41000));
        assert_eq!(gi1.input_packets, Some(1_234_567));
        assert_eq!(gi1.output_packets, Some(7_654_321));
        assert_eq!(gi1.runts, Some(3));
        assert_eq!(gi1.input_errors, Some(7));
        assert_eq!(gi1.crc_errors, Some(2));
        assert_eq!(gi1.collisions, Some(0));
    }

    #[test]
    fn test_admin_down_and_svi() {
        let records = parse_interfaces(SAMPLE);
        assert_eq!(records[1].link_status.as_deref(), Some("administratively down"));
        assert_eq!(records[1].duplex.as_deref(), Some("Auto"));
        assert_eq!(records[1].input_packets, None);
        assert_eq!(records[2].ip_address.as_deref(), Some("10.10.0.2/24"));
    }

    #[test]
    fn test_noise_yields_nothing() {
        assert!(parse_interfaces("  MTU 1500 bytes\n% Invalid input\n").is_empty());
    }
}
