//! Per-device collection sequencer
//!
//! Runs the fixed list of steps against one switch. Each step calls the
//! device (or telemetry) collaborator, parses if needed and replaces the
//! device's slice of one table through the [`SnapshotWriter`]. Every step
//! commits on its own, so data from earlier steps stands when a later one
//! fails.

use crate::commands::DeviceCommands;
use crate::parsers::{self, ParseError};
use crate::telemetry::TelemetrySource;
use crate::{CommandError, TelemetryError};
use chrono::NaiveDate;
use nh_store::{DeviceRow, SnapshotRow, SnapshotWriter, StoreError, Table, WriteOutcome};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

static PORT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/.:-]+$").expect("Invalid port name regex"));

/// Collection steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    RunningConfig,
    Version,
    Interfaces,
    InterfacesStatus,
    CdpNeighbors,
    LldpNeighbors,
    Vlans,
    PowerInline,
    MacAddressTable,
    InterfaceUsage,
}

impl Step {
    pub const ORDER: [Step; 10] = [
        Step::RunningConfig,
        Step::Version,
        Step::Interfaces,
        Step::InterfacesStatus,
        Step::CdpNeighbors,
        Step::LldpNeighbors,
        Step::Vlans,
        Step::PowerInline,
        Step::MacAddressTable,
        Step::InterfaceUsage,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::RunningConfig => "running_config",
            Step::Version => "version",
            Step::Interfaces => "interfaces",
            Step::InterfacesStatus => "interfaces_status",
            Step::CdpNeighbors => "cdp_neighbors",
            Step::LldpNeighbors => "lldp_neighbors",
            Step::Vlans => "vlans",
            Step::PowerInline => "power_inline",
            Step::MacAddressTable => "mac_address_table",
            Step::InterfaceUsage => "interface_usage",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Pending,
    Running(Step),
    Succeeded,
    Failed(Step),
}

/// What a successful step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Rows written (or device rows updated, for the version step)
    Written { rows: usize },
    /// Nothing usable came back; the previous snapshot was kept
    NoData { reason: String },
}

/// Errors that abort a sequence
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of one device sequence
#[derive(Debug)]
pub struct SequenceReport {
    pub device_id: i64,
    pub fqdn: String,
    pub state: SequenceState,
    pub steps: Vec<(Step, StepOutcome)>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl SequenceReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == SequenceState::Succeeded
    }

    #[must_use]
    pub fn failed_step(&self) -> Option<Step> {
        match self.state {
            SequenceState::Failed(step) => Some(step),
            _ => None,
        }
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.steps
            .iter()
            .map(|(_, outcome)| match outcome {
                StepOutcome::Written { rows } => *rows,
                StepOutcome::NoData { .. } => 0,
            })
            .sum()
    }
}

/// The MAC table command, excluding trunk ports and CPU entries.
///
/// Port names outside `[A-Za-z0-9/.:-]` are dropped rather than placed in
/// the command line.
#[must_use]
pub fn mac_table_command(trunk_ports: &[String]) -> String {
    let mut patterns: Vec<String> = Vec::with_capacity(trunk_ports.len() + 1);
    for port in trunk_ports {
        if PORT_NAME.is_match(port) {
            patterns.push(format!("_{port}_"));
        } else {
            warn!(port = %port, "Skipping trunk port with unexpected characters");
        }
    }
    patterns.push("_CPU_".to_string());
    format!("show mac address-table | exclude {}", patterns.join("|"))
}

pub struct Sequencer {
    commands: Arc<dyn DeviceCommands>,
    telemetry: Arc<dyn TelemetrySource>,
    writer: SnapshotWriter,
}

impl Sequencer {
    #[must_use]
    pub fn new(
        commands: Arc<dyn DeviceCommands>,
        telemetry: Arc<dyn TelemetrySource>,
        writer: SnapshotWriter,
    ) -> Self {
        Self {
            commands,
            telemetry,
            writer,
        }
    }

    #[must_use]
    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Run every step in order, stopping at the first one that errors.
    #[instrument(skip(self, device), fields(device_id = device.id, fqdn = %device.fqdn))]
    pub async fn run(&self, device: &DeviceRow, day: NaiveDate) -> SequenceReport {
        let start = Instant::now();
        let mut state = SequenceState::Pending;
        let mut steps = Vec::with_capacity(Step::ORDER.len());
        let mut failure = None;

        for step in Step::ORDER {
            state = SequenceState::Running(step);
            debug!(step = step.as_str(), "Step started");

            match self.run_step(step, device, day).await {
                Ok(outcome) => {
                    if let StepOutcome::NoData { reason } = &outcome {
                        warn!(step = step.as_str(), reason = %reason, "Step produced no data");
                    }
                    steps.push((step, outcome));
                }
                Err(e) => {
                    error!(step = step.as_str(), error = %e, "Step failed, aborting sequence");
                    state = SequenceState::Failed(step);
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if let SequenceState::Running(_) = state {
            state = SequenceState::Succeeded;
        }

        let report = SequenceReport {
            device_id: device.id,
            fqdn: device.fqdn.clone(),
            state,
            steps,
            error: failure,
            duration: start.elapsed(),
        };
        info!(
            succeeded = report.succeeded(),
            rows = report.rows_written(),
            duration_ms = report.duration.as_millis(),
            "Sequence finished"
        );
        report
    }

    async fn run_step(
        &self,
        step: Step,
        device: &DeviceRow,
        day: NaiveDate,
    ) -> Result<StepOutcome, StepError> {
        let host = device.fqdn.as_str();
        let id = device.id;

        match step {
            Step::RunningConfig => {
                let raw = self.commands.show_running_config(host).await?;
                match parsers::parse_interface_config(&raw) {
                    Ok(blocks) => self.write(Table::RunningConfig, id, day, &blocks),
                    Err(ParseError::NoInterfaces) => Ok(StepOutcome::NoData {
                        reason: ParseError::NoInterfaces.to_string(),
                    }),
                }
            }
            Step::Version => {
                let info = self.commands.show_version(host).await?;
                if info.is_empty() {
                    return Ok(no_data("version output had no known fields"));
                }
                let rows = self.writer.store().update_version(id, &info)?;
                Ok(StepOutcome::Written { rows })
            }
            Step::Interfaces => {
                let rows = self.commands.show_interfaces(host).await?;
                self.write(Table::Interfaces, id, day, &rows)
            }
            Step::InterfacesStatus => {
                let rows = self.commands.show_interfaces_status(host).await?;
                self.write(Table::InterfacesStatus, id, day, &rows)
            }
            Step::CdpNeighbors => {
                let rows = self.commands.show_cdp_neighbors(host).await?;
                self.write(Table::CdpNeighbors, id, day, &rows)
            }
            Step::LldpNeighbors => {
                let rows = self.commands.show_lldp_neighbors(host).await?;
                self.write(Table::LldpNeighbors, id, day, &rows)
            }
            Step::Vlans => {
                let rows = self.commands.show_vlan(host).await?;
                self.write(Table::Vlans, id, day, &rows)
            }
            Step::PowerInline => {
                let power = self.commands.show_power_inline(host).await?;
                let modules = self.write(Table::PowerModules, id, day, &power.modules)?;
                let ports = self.write(Table::PowerInterfaces, id, day, &power.interfaces)?;
                Ok(match (modules, ports) {
                    (StepOutcome::NoData { .. }, StepOutcome::NoData { .. }) => {
                        no_data("no PoE modules or ports")
                    }
                    (a, b) => StepOutcome::Written {
                        rows: written(&a) + written(&b),
                    },
                })
            }
            Step::MacAddressTable => {
                let trunks = self.writer.store().connected_trunk_ports(id, day)?;
                let command = mac_table_command(&trunks);
                let raw = self.commands.run_command(host, &command).await?;
                let entries = parsers::parse_mac_address_table(&raw);
                self.write(Table::MacAddressTable, id, day, &entries)
            }
            Step::InterfaceUsage => {
                let usage = self.telemetry.interface_usage(host).await?;
                self.write(Table::InterfaceUsage, id, day, &usage)
            }
        }
    }

    fn write<R: SnapshotRow>(
        &self,
        table: Table,
        device_id: i64,
        day: NaiveDate,
        rows: &[R],
    ) -> Result<StepOutcome, StepError> {
        Ok(match self.writer.replace(table, device_id, day, rows)? {
            WriteOutcome::Replaced { inserted, .. } => StepOutcome::Written { rows: inserted },
            WriteOutcome::SkippedEmpty => no_data("empty result"),
        })
    }
}

fn no_data(reason: &str) -> StepOutcome {
    StepOutcome::NoData {
        reason: reason.to_string(),
    }
}

fn written(outcome: &StepOutcome) -> usize {
    match outcome {
        StepOutcome::Written { rows } => *rows,
        StepOutcome::NoData { .. } => 0,
    }
}
