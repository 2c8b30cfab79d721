//! `show version`

use nh_store::VersionInfo;
use regex::Regex;
use std::sync::LazyLock;

static IOS_RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Cisco IOS.*?, Version ([^\s,]+), RELEASE SOFTWARE \(([^)]+)\)")
        .expect("Invalid IOS release regex")
});
static IOS_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Cisco IOS.*?, Version ([^\s,]+)").expect("Invalid IOS version regex")
});
static UPTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\S+ uptime is (.+?)\s*$").expect("Invalid uptime regex"));
static RESTARTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^System restarted at (.+?)\s*$").expect("Invalid restarted regex")
});
static RELOAD_REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Last reload reason: (.+?)\s*$").expect("Invalid reload reason regex")
});
static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^System image file is "([^"]+)""#).expect("Invalid image regex")
});
static ROMMON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ROM: (.+?)\s*$").expect("Invalid ROM regex"));
static SERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^System [Ss]erial [Nn]umber\s*:\s*(\S+)").expect("Invalid serial regex")
});
static BOARD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Processor board ID (\S+)").expect("Invalid board id regex")
});
static MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Model [Nn]umber\s*:\s*(\S+)").expect("Invalid model regex")
});
static PROCESSOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^cisco (\S+) .*processor").expect("Invalid processor regex")
});

fn first(re: &Regex, raw: &str, group: usize) -> Option<String> {
    re.captures(raw)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().trim().to_string())
}

/// Extract inventory fields; anything missing stays empty.
#[must_use]
pub fn parse_version(raw: &str) -> VersionInfo {
    VersionInfo {
        hardware: first(&MODEL, raw, 1)
            .or_else(|| first(&PROCESSOR, raw, 1))
            .unwrap_or_default(),
        version: first(&IOS_RELEASE, raw, 1)
            .or_else(|| first(&IOS_VERSION, raw, 1))
            .unwrap_or_default(),
        release: first(&IOS_RELEASE, raw, 2).unwrap_or_default(),
        software_image: first(&IMAGE, raw, 1).unwrap_or_default(),
        serial: first(&SERIAL, raw, 1)
            .or_else(|| first(&BOARD_ID, raw, 1))
            .unwrap_or_default(),
        uptime: first(&UPTIME, raw, 1).unwrap_or_default(),
        restarted: first(&RESTARTED, raw, 1).unwrap_or_default(),
        reload_reason: first(&RELOAD_REASON, raw, 1).unwrap_or_default(),
        rommon: first(&ROMMON, raw, 1).unwrap_or_default(),
    }
}
