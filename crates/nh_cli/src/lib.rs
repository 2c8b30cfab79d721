//! nh_cli - CLI commands for netharvest
//!
//! This crate provides:
//! - clap-based command definitions
//! - Wiring of the concrete collaborators (SSH, TCP probe, AKiPS) into the
//!   harvest pipeline
//! - Text and JSON rendering of runs, devices and interfaces

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use nh_collect::{
    AkipsClient, CliDeviceCommands, DisabledTelemetry, HarvestError, HarvestSettings,
    HarvestSummary, Harvester, SshExecutor, TcpProbe, TelemetryError, TelemetrySource,
};
use nh_config::NhConfig;
use nh_store::{HarvestRun, NhStore};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Config error: {0}")]
    ConfigError(#[from] nh_config::ConfigError),

    #[error("Store error: {0}")]
    StoreError(#[from] nh_store::StoreError),

    #[error("Harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    #[error("Telemetry error: {0}")]
    TelemetryError(#[from] TelemetryError),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Main CLI application
#[derive(Parser, Debug)]
#[command(name = "nh")]
#[command(author, version, about = "netharvest - switch fleet state harvester")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for commands
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every switch, or one switch with --device
    Harvest {
        /// Switch id to harvest on its own
        #[arg(short, long)]
        device: Option<i64>,
    },

    /// List switches with reachability and version
    Devices,

    /// Show the derived interface view of one switch
    Interfaces {
        /// Switch id
        #[arg(short, long)]
        device: i64,

        /// Snapshot day (YYYY-MM-DD), today by default
        #[arg(long, value_parser = parse_day)]
        day: Option<NaiveDate>,
    },

    /// Show recent harvest runs
    Runs {
        /// Maximum number of runs
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets masked)
    Show,
    /// Check that the configuration is complete enough to harvest
    Validate,
}

impl Cli {
    /// Execute the selected command.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] when configuration, storage or the harvest fails.
    pub async fn run(self) -> Result<(), CliError> {
        let config = load_config(self.config.as_ref())?;
        match self.command {
            Commands::Harvest { device } => {
                config.validate_for_harvest()?;
                let store = Arc::new(open_store(&config)?);
                let harvester = build_harvester(&config, store)?;
                let day = today();
                let summary = match device {
                    Some(id) => harvester.run_device(id, day).await?,
                    None => harvester.run_all(day).await?,
                };
                match self.format {
                    OutputFormat::Text => print!("{}", render_summary(&summary)),
                    OutputFormat::Json => print_output(&summary_json(&summary)),
                }
            }
            Commands::Devices => {
                let store = open_store(&config)?;
                let devices = store.list_devices()?;
                let counts = store.device_counts()?;
                match self.format {
                    OutputFormat::Json => print_output(&serde_json::json!({
                        "devices": devices,
                        "counts": counts,
                    })),
                    OutputFormat::Text => {
                        println!("{:>6}  {:<40} {:<11} {:<12} HARDWARE", "ID", "FQDN", "REACHABLE", "VERSION");
                        for device in &devices {
                            let reachable = match device.reachable {
                                Some(true) => "yes",
                                Some(false) => "no",
                                None => "-",
                            };
                            println!(
                                "{:>6}  {:<40} {:<11} {:<12} {}",
                                device.id,
                                device.fqdn,
                                reachable,
                                device.version.as_deref().unwrap_or("-"),
                                device.hardware.as_deref().unwrap_or("-"),
                            );
                        }
                        println!(
                            "\n{} switches: {} reachable, {} unreachable, {} never probed",
                            counts.total, counts.reachable, counts.unreachable, counts.never_probed
                        );
                    }
                }
            }
            Commands::Interfaces { device, day } => {
                let store = open_store(&config)?;
                if store.get_device(device)?.is_none() {
                    return Err(CliError::HarvestError(HarvestError::DeviceNotFound(device)));
                }
                let day = day.unwrap_or_else(today);
                let rows = store.interfaces_for_device(device, day)?;
                match self.format {
                    OutputFormat::Json => print_output(&rows),
                    OutputFormat::Text => {
                        println!(
                            "{:<14} {:<10} {:<8} {:<16} {:<16} {:<6} {:<20} DESCRIPTION",
                            "INTERFACE", "LINK", "PROTO", "MAC", "IP", "VLAN", "VLAN NAME"
                        );
                        for row in &rows {
                            println!(
                                "{:<14} {:<10} {:<8} {:<16} {:<16} {:<6} {:<20} {}",
                                row.interface,
                                row.link_status.as_deref().unwrap_or("-"),
                                row.protocol_status.as_deref().unwrap_or("-"),
                                row.mac_address.as_deref().unwrap_or("-"),
                                row.ip_address.as_deref().unwrap_or("-"),
                                row.vlan_id.as_deref().unwrap_or("-"),
                                row.vlan_name.as_deref().unwrap_or("-"),
                                row.description.as_deref().unwrap_or(""),
                            );
                        }
                        if rows.is_empty() {
                            println!("No interfaces recorded for device {device} on {day}");
                        }
                    }
                }
            }
            Commands::Runs { limit } => {
                let store = open_store(&config)?;
                let runs = store.list_harvest_runs(limit)?;
                match self.format {
                    OutputFormat::Json => print_output(&runs),
                    OutputFormat::Text => print!("{}", render_runs(&runs)),
                }
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => {
                    let masked = masked_config(&config);
                    match self.format {
                        OutputFormat::Json => print_output(&masked),
                        OutputFormat::Text => {
                            let text = toml::to_string_pretty(&masked)
                                .map_err(|e| CliError::CommandFailed(e.to_string()))?;
                            print!("{text}");
                        }
                    }
                }
                ConfigCommands::Validate => {
                    config.validate_for_harvest()?;
                    println!("✓ Configuration is valid");
                }
            },
        }

        Ok(())
    }
}

fn load_config(config_path: Option<&PathBuf>) -> Result<NhConfig, CliError> {
    let config = match config_path {
        Some(path) => NhConfig::load_with_env(path)?,
        None => NhConfig::discover_with_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn open_store(config: &NhConfig) -> Result<NhStore, CliError> {
    Ok(NhStore::open(&config.global.db_path)?)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("invalid day '{value}': {e}"))
}

/// Concrete collaborators: SSH commands, TCP probe and AKiPS (or nothing)
fn build_harvester(config: &NhConfig, store: Arc<NhStore>) -> Result<Harvester, CliError> {
    let executor = SshExecutor::from_config(config)?;
    let telemetry: Arc<dyn TelemetrySource> = if config.akips.enabled {
        Arc::new(AkipsClient::from_config(config)?)
    } else {
        info!("AKiPS disabled; skipping inventory reconciliation and interface usage");
        Arc::new(DisabledTelemetry)
    };

    Ok(Harvester::new(
        store,
        Arc::new(CliDeviceCommands::new(executor)),
        Arc::new(TcpProbe::from_config(config)),
        telemetry,
        HarvestSettings::from_config(config),
    ))
}

fn masked_config(config: &NhConfig) -> NhConfig {
    let mut masked = config.clone();
    if masked.akips.password.is_some() {
        masked.akips.password = Some("********".to_string());
    }
    masked
}

/// Human-readable run summary
#[must_use]
pub fn render_summary(summary: &HarvestSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Harvest ({}) for {} finished in {:.1}s",
        summary.mode.as_str(),
        summary.day,
        summary.total_duration.as_secs_f64()
    );
    if let Some(id) = summary.run_id {
        let _ = writeln!(out, "  run id:       {id}");
    }
    if summary.devices_discovered > 0 {
        let _ = writeln!(out, "  discovered:   {}", summary.devices_discovered);
    }
    let _ = writeln!(out, "  devices:      {}", summary.devices_attempted);
    let _ = writeln!(out, "  reachable:    {}", summary.devices_reachable);
    let _ = writeln!(out, "  unreachable:  {}", summary.devices_unreachable);
    let _ = writeln!(
        out,
        "  succeeded:    {} ({:.1}%)",
        summary.devices_succeeded,
        summary.success_rate()
    );
    let _ = writeln!(out, "  failed:       {}", summary.devices_failed);
    let _ = writeln!(out, "  rows written: {}", summary.total_rows);

    for refresh in &summary.refresh {
        let updated = refresh
            .updated
            .map_or_else(|| "failed".to_string(), |n| n.to_string());
        let _ = writeln!(out, "  refresh {:<12} {updated}", refresh.name);
    }

    let failures: Vec<_> = summary
        .outcomes
        .iter()
        .filter(|o| (o.reachable && !o.succeeded()) || o.error.is_some())
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for outcome in failures {
            let step = outcome
                .report
                .as_ref()
                .and_then(|r| r.failed_step())
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            let reason = outcome
                .error
                .as_deref()
                .or_else(|| outcome.report.as_ref().and_then(|r| r.error.as_deref()))
                .unwrap_or("unknown");
            let _ = writeln!(
                out,
                "  {} ({}) at {step}: {reason}",
                outcome.fqdn, outcome.device_id
            );
        }
    }
    out
}

/// Machine-readable run summary
#[must_use]
pub fn summary_json(summary: &HarvestSummary) -> serde_json::Value {
    let outcomes: Vec<serde_json::Value> = summary
        .outcomes
        .iter()
        .map(|o| {
            serde_json::json!({
                "device_id": o.device_id,
                "fqdn": o.fqdn,
                "reachable": o.reachable,
                "succeeded": o.succeeded(),
                "failed_step": o.report.as_ref().and_then(|r| r.failed_step()),
                "error": o.error.as_deref().or_else(|| o.report.as_ref().and_then(|r| r.error.as_deref())),
                "rows": o.rows_written(),
                "duration_ms": u64::try_from(o.duration.as_millis()).unwrap_or(u64::MAX),
            })
        })
        .collect();
    let refresh: serde_json::Map<String, serde_json::Value> = summary
        .refresh
        .iter()
        .map(|r| (r.name.to_string(), serde_json::json!(r.updated)))
        .collect();

    serde_json::json!({
        "run_id": summary.run_id,
        "mode": summary.mode,
        "day": summary.day,
        "devices": {
            "attempted": summary.devices_attempted,
            "reachable": summary.devices_reachable,
            "unreachable": summary.devices_unreachable,
            "succeeded": summary.devices_succeeded,
            "failed": summary.devices_failed,
            "discovered": summary.devices_discovered,
        },
        "batches": summary.batches,
        "rows": summary.total_rows,
        "refresh": refresh,
        "duration_ms": u64::try_from(summary.total_duration.as_millis()).unwrap_or(u64::MAX),
        "outcomes": outcomes,
    })
}

/// Recent runs as a table
#[must_use]
pub fn render_runs(runs: &[HarvestRun]) -> String {
    if runs.is_empty() {
        return "No harvest runs recorded\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<6} {:<8} {:<10} {:<20} {:>6} {:>6} {:>6} {:>6}",
        "ID", "MODE", "DEVICE", "DAY", "STARTED", "TOTAL", "UP", "OK", "FAIL"
    );
    for run in runs {
        let _ = writeln!(
            out,
            "{:>5}  {:<6} {:<8} {:<10} {:<20} {:>6} {:>6} {:>6} {:>6}",
            run.id.unwrap_or_default(),
            run.mode.as_str(),
            run.device_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            run.day,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.devices_total,
            run.devices_reachable,
            run.devices_succeeded,
            run.devices_failed,
        );
    }
    out
}

fn print_output<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {e}"}}"#));
    println!("{json}");
}
