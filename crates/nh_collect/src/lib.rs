//! nh_collect - Switch harvest pipeline
//!
//! This crate provides:
//! - Parsers turning IOS command output into snapshot records
//! - The collaborator traits the pipeline consumes (device commands,
//!   reachability probe, telemetry source) and one concrete implementation
//!   of each
//! - The per-device collection sequencer
//! - The batch dispatcher with its bounded worker pool and refresh pass
//!
//! # Failure domains
//!
//! 1. **Per step**: parse errors and empty output are "no data"; the step
//!    keeps the previous snapshot and the sequence continues
//! 2. **Per device**: transport and store errors abort that device only
//! 3. **Per run**: only the run lock and the inventory read fail a whole run

use chrono::{DateTime, Utc};
use nh_store::StoreError;
use std::time::Duration;
use thiserror::Error;

pub mod commands;
pub mod dispatcher;
pub mod executor;
pub mod inventory;
pub mod pacer;
pub mod parsers;
pub mod pool;
pub mod probe;
pub mod records;
pub mod sequencer;
pub mod telemetry;

pub use commands::{CliDeviceCommands, DeviceCommands};
pub use dispatcher::{DeviceOutcome, HarvestSettings, HarvestSummary, Harvester, RefreshResult};
pub use executor::{CommandTransport, SshExecutor};
pub use pacer::{NoopPacer, Pacer, Pause, RecordingPacer, TokioPacer};
pub use pool::{PoolStats, WorkerPool};
pub use probe::{ReachabilityProbe, TcpProbe};
pub use records::*;
pub use sequencer::{SequenceReport, SequenceState, Sequencer, Step, StepError, StepOutcome};
pub use telemetry::{AkipsClient, DisabledTelemetry, DiscoveredSwitch, TelemetrySource};

/// Device command errors (transport or CLI failure)
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Transport to {host} failed: {reason}")]
    Transport { host: String, reason: String },

    #[error("Timeout after {timeout:?} running '{command}' on {host}")]
    Timeout {
        host: String,
        command: String,
        timeout: Duration,
    },

    #[error("'{command}' on {host} exited with code {exit_code}: {stderr}")]
    Failed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Telemetry source errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telemetry API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Telemetry source misconfigured: {0}")]
    Config(String),
}

/// Run-level errors
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Another harvest run holds the lock ({holder}, since {since})")]
    RunInProgress { holder: String, since: DateTime<Utc> },

    #[error("Device {0} not found")]
    DeviceNotFound(i64),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Worker failed: {0}")]
    Worker(String),
}
