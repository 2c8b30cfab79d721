//! Device command collaborator
//!
//! [`DeviceCommands`] is what the sequencer talks to. [`CliDeviceCommands`]
//! implements it over any [`CommandTransport`] by issuing IOS exec commands
//! and parsing their text locally.

use crate::executor::CommandTransport;
use crate::parsers;
use crate::records::{
    InterfaceRecord, InterfaceStatusRecord, NeighborRecord, PowerInline, VlanRecord,
};
use crate::CommandError;
use async_trait::async_trait;
use nh_store::VersionInfo;

pub const SHOW_VERSION: &str = "show version";
pub const SHOW_INTERFACES: &str = "show interfaces";
pub const SHOW_INTERFACES_STATUS: &str = "show interfaces status";
pub const SHOW_VLAN_BRIEF: &str = "show vlan brief";
pub const SHOW_CDP_NEIGHBORS: &str = "show cdp neighbors";
pub const SHOW_LLDP_NEIGHBORS: &str = "show lldp neighbors";
pub const SHOW_POWER_INLINE: &str = "show power inline";
pub const SHOW_RUNNING_CONFIG: &str = "show running-config";

/// Structured and raw access to one switch's CLI
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    async fn show_version(&self, host: &str) -> Result<VersionInfo, CommandError>;

    async fn show_interfaces(&self, host: &str) -> Result<Vec<InterfaceRecord>, CommandError>;

    async fn show_interfaces_status(
        &self,
        host: &str,
    ) -> Result<Vec<InterfaceStatusRecord>, CommandError>;

    async fn show_vlan(&self, host: &str) -> Result<Vec<VlanRecord>, CommandError>;

    async fn show_cdp_neighbors(&self, host: &str) -> Result<Vec<NeighborRecord>, CommandError>;

    async fn show_lldp_neighbors(&self, host: &str) -> Result<Vec<NeighborRecord>, CommandError>;

    async fn show_power_inline(&self, host: &str) -> Result<PowerInline, CommandError>;

    /// Raw `show running-config` text
    async fn show_running_config(&self, host: &str) -> Result<String, CommandError>;

    /// Raw output of an arbitrary exec command
    async fn run_command(&self, host: &str, command: &str) -> Result<String, CommandError>;
}

/// [`DeviceCommands`] over a text transport
#[derive(Debug, Clone)]
pub struct CliDeviceCommands<T> {
    transport: T,
}

impl<T: CommandTransport> CliDeviceCommands<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: CommandTransport> DeviceCommands for CliDeviceCommands<T> {
    async fn show_version(&self, host: &str) -> Result<VersionInfo, CommandError> {
        let raw = self.transport.run(host, SHOW_VERSION).await?;
        Ok(parsers::parse_version(&raw))
    }

    async fn show_interfaces(&self, host: &str) -> Result<Vec<InterfaceRecord>, CommandError> {
        let raw = self.transport.run(host, SHOW_INTERFACES).await?;
        Ok(parsers::parse_interfaces(&raw))
    }

    async fn show_interfaces_status(
        &self,
        host: &str,
    ) -> Result<Vec<InterfaceStatusRecord>, CommandError> {
        let raw = self.transport.run(host, SHOW_INTERFACES_STATUS).await?;
        Ok(parsers::parse_interfaces_status(&raw))
    }

    async fn show_vlan(&self, host: &str) -> Result<Vec<VlanRecord>, CommandError> {
        let raw = self.transport.run(host, SHOW_VLAN_BRIEF).await?;
        Ok(parsers::parse_vlan_brief(&raw))
    }

    async fn show_cdp_neighbors(&self, host: &str) -> Result<Vec<NeighborRecord>, CommandError> {
        let raw = self.transport.run(host, SHOW_CDP_NEIGHBORS).await?;
        Ok(parsers::parse_cdp_neighbors(&raw))
    }

    async fn show_lldp_neighbors(&self, host: &str) -> Result<Vec<NeighborRecord>, CommandError> {
        let raw = self.transport.run(host, SHOW_LLDP_NEIGHBORS).await?;
        Ok(parsers::parse_lldp_neighbors(&raw))
    }

    async fn show_power_inline(&self, host: &str) -> Result<PowerInline, CommandError> {
        let raw = self.transport.run(host, SHOW_POWER_INLINE).await?;
        Ok(parsers::parse_power_inline(&raw))
    }

    async fn show_running_config(&self, host: &str) -> Result<String, CommandError> {
        self.transport.run(host, SHOW_RUNNING_CONFIG).await
    }

    async fn run_command(&self, host: &str, command: &str) -> Result<String, CommandError> {
        self.transport.run(host, command).await
    }
}
