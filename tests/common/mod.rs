#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use nh_collect::{
    CliDeviceCommands, CommandError, CommandTransport, DiscoveredSwitch, HarvestSettings,
    Harvester, InterfaceUsageRecord, NoopPacer, ReachabilityProbe, TelemetryError,
    TelemetrySource,
};
use nh_store::{NewDevice, NhStore};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing once for integration tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter)
            .init();
    });
}

/// Build a default config whose database lives in `dir`.
pub fn temp_config(dir: &tempfile::TempDir) -> nh_config::NhConfig {
    let mut config = nh_config::NhConfig::default();
    config.global.db_path = dir.path().join("nh.duckdb");
    config
}

pub const RUNNING_CONFIG: &str = "\
Building configuration...
!
hostname access-sw
!
interface GigabitEthernet1/0/1
 description Staff desk 101
 switchport access vlan 10
 switchport mode access
!
interface TenGigabitEthernet1/1/1
 description Uplink core-1
 switchport mode trunk
!
end
";

pub const SHOW_VERSION: &str = "\
Cisco IOS XE Software, Version 17.09.04a
Cisco IOS Software [Cupertino], Catalyst L3 Switch Software (CAT9K_IOSXE), Version 17.9.4a, RELEASE SOFTWARE (fc3)
ROM: IOS-XE ROMMON
access-sw uptime is 12 weeks, 3 days, 4 hours, 5 minutes
System image file is \"flash:packages.conf\"
Last reload reason: Reload Command
Model Number                       : C9300-48P
System Serial Number               : FOC1234X0AB
";

pub const SHOW_INTERFACES: &str = "\
GigabitEthernet1/0/1 is up, line protocol is up (connected)
  Hardware is Gigabit Ethernet, address is 00aa.bbcc.0101 (bia 00aa.bbcc.0101)
  Description: Staff desk 101
  MTU 1500 bytes, BW 1000000 Kbit/sec, DLY 10 usec,
     reliability 255/255, txload 1/255, rxload 1/255
  Full-duplex, 1000Mb/s, media type is 10/100/1000BaseTX
     0 input errors, 0 CRC, 0 frame, 0 overrun, 0 ignored
TenGigabitEthernet1/1/1 is up, line protocol is up (connected)
  Hardware is Ten Gigabit Ethernet, address is 00aa.bbcc.0201 (bia 00aa.bbcc.0201)
  Description: Uplink core-1
  MTU 1500 bytes, BW 10000000 Kbit/sec, DLY 10 usec,
     reliability 255/255, txload 3/255, rxload 2/255
";

pub const SHOW_INTERFACES_STATUS: &str = "\
Port         Name               Status       Vlan       Duplex  Speed Type
Gi1/0/1      Staff desk 101     connected    10         a-full a-1000 10/100/1000BaseTX
Te1/1/1      Uplink core-1      connected    trunk        full    10G SFP-10GBase-SR
";

pub const SHOW_VLAN_BRIEF: &str = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active
10   STAFF                            active    Gi1/0/1
";

pub const SHOW_CDP_NEIGHBORS: &str = "\
Device ID        Local Intrfce     Holdtme    Capability  Platform  Port ID
core-1.example.net
                 Ten 1/1/1         142             R S I  C9500-48Y Ten 1/0/1

Total cdp entries displayed : 1
";

pub const SHOW_LLDP_NEIGHBORS: &str = "\
Device ID           Local Intf     Hold-time  Capability      Port ID
core-1.example.net  Te1/1/1        120        B,R             Te1/0/1

Total entries displayed: 1
";

pub const SHOW_POWER_INLINE: &str = "\
Module   Available     Used     Remaining
          (Watts)     (Watts)    (Watts)
------   ---------   --------   ---------
1           740.0        6.5       733.5
Interface Admin  Oper       Power   Device              Class Max
                            (Watts)
--------- ------ ---------- ------- ------------------- ----- ----
Gi1/0/1   auto   on         6.5     IP Phone 8845       2     30.0
";

pub const SHOW_MAC_ADDRESS_TABLE: &str = "\
          Mac Address Table
-------------------------------------------
Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
  10    0011.2233.4455    DYNAMIC     Gi1/0/1
Total Mac Addresses for this criterion: 1
";

/// Canned IOS output for a small fleet, recording every command it receives
#[derive(Default)]
pub struct FakeFleet {
    /// host -> command prefix that fails on that host
    failures: HashMap<String, String>,
    delay: Duration,
    issued: Mutex<Vec<(String, String)>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, host: &str, command_prefix: &str) -> Self {
        self.failures
            .insert(host.to_string(), command_prefix.to_string());
        self
    }

    /// Delay applied to every command, to force jobs to overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn issued(&self) -> Vec<(String, String)> {
        self.issued.lock().unwrap().clone()
    }

    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.issued()
            .into_iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c)
            .collect()
    }
}

#[async_trait]
impl CommandTransport for FakeFleet {
    async fn run(&self, host: &str, command: &str) -> Result<String, CommandError> {
        self.issued
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(prefix) = self.failures.get(host)
            && command.starts_with(prefix.as_str())
        {
            return Err(CommandError::Failed {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: 1,
                stderr: "% Invalid input detected".to_string(),
            });
        }

        let output = match command {
            "show running-config" => RUNNING_CONFIG,
            "show version" => SHOW_VERSION,
            "show interfaces" => SHOW_INTERFACES,
            "show interfaces status" => SHOW_INTERFACES_STATUS,
            "show vlan brief" => SHOW_VLAN_BRIEF,
            "show cdp neighbors" => SHOW_CDP_NEIGHBORS,
            "show lldp neighbors" => SHOW_LLDP_NEIGHBORS,
            "show power inline" => SHOW_POWER_INLINE,
            c if c.starts_with("show mac address-table") => SHOW_MAC_ADDRESS_TABLE,
            _ => "",
        };
        Ok(output.to_string())
    }
}

/// Every host is reachable except the listed ones
#[derive(Default)]
pub struct SetProbe {
    down: HashSet<String>,
}

impl SetProbe {
    pub fn down(hosts: &[&str]) -> Self {
        Self {
            down: hosts.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for SetProbe {
    async fn is_reachable(&self, host: &str) -> bool {
        !self.down.contains(host)
    }
}

/// Telemetry with a fixed switch list and one usage row per device
#[derive(Default)]
pub struct StaticTelemetry {
    pub switches: Vec<DiscoveredSwitch>,
}

#[async_trait]
impl TelemetrySource for StaticTelemetry {
    async fn switch_list(&self) -> Result<Vec<DiscoveredSwitch>, TelemetryError> {
        Ok(self.switches.clone())
    }

    async fn interface_usage(
        &self,
        _fqdn: &str,
    ) -> Result<Vec<InterfaceUsageRecord>, TelemetryError> {
        Ok(vec![InterfaceUsageRecord {
            interface: "Gi1/0/1".to_string(),
            status: "up".to_string(),
            last_change: "2026-03-01 08:00:00".to_string(),
            days: 13,
            hours: 2,
            minutes: 5,
        }])
    }
}

pub fn seed_devices(store: &NhStore, fqdns: &[&str]) -> Vec<i64> {
    let devices: Vec<NewDevice> = fqdns
        .iter()
        .map(|fqdn| NewDevice {
            fqdn: (*fqdn).to_string(),
            ip_address: None,
        })
        .collect();
    store.insert_devices(&devices).unwrap()
}

pub fn settings(batch_size: usize, max_concurrent: usize) -> HarvestSettings {
    HarvestSettings {
        batch_size,
        max_concurrent,
        reconcile_inventory: false,
        ..HarvestSettings::default()
    }
}

/// Harvester over the fake fleet with pacing disabled
pub fn harvester(
    store: Arc<NhStore>,
    fleet: Arc<FakeFleet>,
    probe: SetProbe,
    telemetry: Arc<dyn TelemetrySource>,
    settings: HarvestSettings,
) -> Harvester {
    Harvester::new(
        store,
        Arc::new(CliDeviceCommands::new(fleet)),
        Arc::new(probe),
        telemetry,
        settings,
    )
    .with_pacer(Arc::new(NoopPacer))
}
