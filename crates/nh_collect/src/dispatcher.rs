//! Batch dispatcher
//!
//! Fans a harvest out across the inventory: fixed-size batches run one after
//! another with a cooldown in between; inside a batch the worker pool runs
//! probe-then-sequence for every device. After the last batch a refresh pass
//! backfills the derived columns of `interfaces`.

use crate::commands::DeviceCommands;
use crate::inventory;
use crate::pacer::{Pacer, Pause, TokioPacer};
use crate::pool::{PoolStats, WorkerPool};
use crate::probe::ReachabilityProbe;
use crate::sequencer::{SequenceReport, Sequencer};
use crate::telemetry::TelemetrySource;
use crate::HarvestError;
use chrono::{DateTime, NaiveDate, Utc};
use nh_config::NhConfig;
use nh_store::{
    DeviceRow, HarvestRun, LockAttempt, NhStore, RefreshScope, RunMode, SnapshotWriter, StoreError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Knobs of a harvest run
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub batch_cooldown: Duration,
    pub refresh_step_delay: Duration,
    pub single_device_refresh_delay: Duration,
    pub insert_chunk_size: usize,
    pub run_lock_stale_after: Duration,
    /// Insert switches known to the telemetry source before a full run
    pub reconcile_inventory: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self::from_config(&NhConfig::default())
    }
}

impl HarvestSettings {
    #[must_use]
    pub fn from_config(config: &NhConfig) -> Self {
        Self {
            batch_size: config.harvest.batch_size.max(1),
            max_concurrent: config.harvest.max_concurrent.max(1),
            batch_cooldown: config.batch_cooldown(),
            refresh_step_delay: config.refresh_step_delay(),
            single_device_refresh_delay: config.single_device_refresh_delay(),
            insert_chunk_size: config.harvest.insert_chunk_size,
            run_lock_stale_after: config.run_lock_stale_after(),
            reconcile_inventory: config.akips.enabled,
        }
    }
}

/// Result of harvesting one device
#[derive(Debug)]
pub struct DeviceOutcome {
    pub device_id: i64,
    pub fqdn: String,
    pub reachable: bool,
    /// `None` when the device was unreachable or never got that far
    pub report: Option<SequenceReport>,
    /// Errors outside the sequence (reachability write, worker failure)
    pub error: Option<String>,
    pub duration: Duration,
}

impl DeviceOutcome {
    fn failed(device: &DeviceRow, error: impl Into<String>) -> Self {
        Self {
            device_id: device.id,
            fqdn: device.fqdn.clone(),
            reachable: false,
            report: None,
            error: Some(error.into()),
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.report.as_ref().is_some_and(SequenceReport::succeeded)
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.report.as_ref().map_or(0, SequenceReport::rows_written)
    }
}

/// Rows touched by one refresh join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    pub name: &'static str,
    pub updated: Option<usize>,
}

/// Summary of a harvest run
#[derive(Debug)]
pub struct HarvestSummary {
    pub mode: RunMode,
    pub day: NaiveDate,
    pub run_id: Option<i64>,
    pub devices_attempted: usize,
    pub devices_reachable: usize,
    pub devices_unreachable: usize,
    pub devices_succeeded: usize,
    pub devices_failed: usize,
    pub devices_discovered: usize,
    pub batches: usize,
    pub total_rows: usize,
    pub refresh: Vec<RefreshResult>,
    pub total_duration: Duration,
    pub outcomes: Vec<DeviceOutcome>,
}

impl HarvestSummary {
    #[must_use]
    pub fn new(mode: RunMode, day: NaiveDate) -> Self {
        Self {
            mode,
            day,
            run_id: None,
            devices_attempted: 0,
            devices_reachable: 0,
            devices_unreachable: 0,
            devices_succeeded: 0,
            devices_failed: 0,
            devices_discovered: 0,
            batches: 0,
            total_rows: 0,
            refresh: Vec::new(),
            total_duration: Duration::ZERO,
            outcomes: Vec::new(),
        }
    }

    /// Unreachable devices count as neither succeeded nor failed
    pub fn add_outcome(&mut self, outcome: DeviceOutcome) {
        self.devices_attempted += 1;
        if outcome.reachable {
            self.devices_reachable += 1;
            if outcome.succeeded() {
                self.devices_succeeded += 1;
            } else {
                self.devices_failed += 1;
            }
        } else if outcome.error.is_some() {
            self.devices_failed += 1;
        } else {
            self.devices_unreachable += 1;
        }
        self.total_rows += outcome.rows_written();
        self.outcomes.push(outcome);
    }

    /// Succeeded devices as a percentage of reachable ones
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.devices_reachable == 0 {
            0.0
        } else {
            let succeeded = u32::try_from(self.devices_succeeded).unwrap_or(u32::MAX);
            let reachable = u32::try_from(self.devices_reachable).unwrap_or(u32::MAX);
            (f64::from(succeeded) / f64::from(reachable)) * 100.0
        }
    }

    fn to_run_record(
        &self,
        device_id: Option<i64>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> HarvestRun {
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        HarvestRun {
            id: None,
            mode: self.mode,
            device_id,
            day: self.day,
            started_at,
            finished_at,
            devices_total: count(self.devices_attempted),
            devices_reachable: count(self.devices_reachable),
            devices_unreachable: count(self.devices_unreachable),
            devices_succeeded: count(self.devices_succeeded),
            devices_failed: count(self.devices_failed),
        }
    }
}

/// Probe, record reachability and run the sequence when reachable
async fn harvest_device(
    device: DeviceRow,
    day: NaiveDate,
    store: Arc<NhStore>,
    probe: Arc<dyn ReachabilityProbe>,
    sequencer: Arc<Sequencer>,
) -> DeviceOutcome {
    let start = Instant::now();
    let reachable = probe.is_reachable(&device.fqdn).await;

    if let Err(e) = store.set_reachable(device.id, reachable) {
        error!(device_id = device.id, error = %e, "Failed to record reachability");
        return DeviceOutcome::failed(&device, e.to_string());
    }

    if !reachable {
        info!(device_id = device.id, fqdn = %device.fqdn, "Device unreachable, skipping");
        return DeviceOutcome {
            device_id: device.id,
            fqdn: device.fqdn,
            reachable,
            report: None,
            error: None,
            duration: start.elapsed(),
        };
    }

    let report = sequencer.run(&device, day).await;
    DeviceOutcome {
        device_id: device.id,
        fqdn: device.fqdn,
        reachable,
        report: Some(report),
        error: None,
        duration: start.elapsed(),
    }
}

pub struct Harvester {
    store: Arc<NhStore>,
    sequencer: Arc<Sequencer>,
    probe: Arc<dyn ReachabilityProbe>,
    telemetry: Arc<dyn TelemetrySource>,
    pacer: Arc<dyn Pacer>,
    pool: WorkerPool,
    settings: HarvestSettings,
    holder: String,
}

impl Harvester {
    #[must_use]
    pub fn new(
        store: Arc<NhStore>,
        commands: Arc<dyn DeviceCommands>,
        probe: Arc<dyn ReachabilityProbe>,
        telemetry: Arc<dyn TelemetrySource>,
        settings: HarvestSettings,
    ) -> Self {
        let writer = SnapshotWriter::new(store.clone(), settings.insert_chunk_size);
        let sequencer = Sequencer::new(commands, telemetry.clone(), writer);
        Self {
            store,
            sequencer: Arc::new(sequencer),
            probe,
            telemetry,
            pacer: Arc::new(TokioPacer),
            pool: WorkerPool::new(settings.max_concurrent, settings.max_concurrent),
            settings,
            holder: format!("nh-{}", std::process::id()),
        }
    }

    #[must_use]
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Name written into the run lock
    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    #[must_use]
    pub fn pool_stats(&self) -> &Arc<PoolStats> {
        self.pool.stats()
    }

    #[must_use]
    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvest every known device for `day`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::RunInProgress`] if another run holds the lock,
    /// or a store error if the inventory cannot be read. Per-device failures
    /// are reported in the summary, not as errors.
    #[instrument(skip(self))]
    pub async fn run_all(&self, day: NaiveDate) -> Result<HarvestSummary, HarvestError> {
        let started_at = Utc::now();
        self.acquire_lock(started_at)?;
        let result = self.run_all_locked(day, started_at).await;
        self.release_lock();
        result
    }

    /// Harvest one device with concurrency 1 and a device-scoped refresh.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::RunInProgress`], [`HarvestError::DeviceNotFound`]
    /// or a store error.
    #[instrument(skip(self))]
    pub async fn run_device(
        &self,
        device_id: i64,
        day: NaiveDate,
    ) -> Result<HarvestSummary, HarvestError> {
        let started_at = Utc::now();
        self.acquire_lock(started_at)?;
        let result = self.run_device_locked(device_id, day, started_at).await;
        self.release_lock();
        result
    }

    fn acquire_lock(&self, now: DateTime<Utc>) -> Result<(), HarvestError> {
        match self
            .store
            .try_acquire_run_lock(&self.holder, now, self.settings.run_lock_stale_after)?
        {
            LockAttempt::Held {
                holder,
                acquired_at,
            } => Err(HarvestError::RunInProgress {
                holder,
                since: acquired_at,
            }),
            LockAttempt::Acquired | LockAttempt::TookOver { .. } => Ok(()),
        }
    }

    fn release_lock(&self) {
        match self.store.release_run_lock(&self.holder) {
            Ok(true) => {}
            Ok(false) => warn!(holder = %self.holder, "Run lock was no longer ours at release"),
            Err(e) => error!(error = %e, "Failed to release run lock"),
        }
    }

    async fn run_all_locked(
        &self,
        day: NaiveDate,
        started_at: DateTime<Utc>,
    ) -> Result<HarvestSummary, HarvestError> {
        let start = Instant::now();
        let mut summary = HarvestSummary::new(RunMode::Full, day);

        if self.settings.reconcile_inventory {
            match inventory::reconcile(&self.store, self.telemetry.as_ref()).await {
                Ok(inserted) => summary.devices_discovered = inserted,
                Err(e) => warn!(error = %e, "Inventory reconciliation failed, using known devices"),
            }
        }

        let devices = self.store.list_devices()?;
        let batches: Vec<&[DeviceRow]> = devices.chunks(self.settings.batch_size).collect();
        info!(
            devices = devices.len(),
            batches = batches.len(),
            batch_size = self.settings.batch_size,
            max_concurrent = self.settings.max_concurrent,
            "Starting harvest"
        );

        for (index, batch) in batches.iter().enumerate() {
            let batch_start = Instant::now();
            let outcomes = self.run_batch(batch, day).await;
            let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
            info!(
                batch = index + 1,
                devices = batch.len(),
                succeeded,
                duration_ms = batch_start.elapsed().as_millis(),
                "Batch complete"
            );
            for outcome in outcomes {
                summary.add_outcome(outcome);
            }
            summary.batches += 1;

            if index + 1 < batches.len() {
                self.pacer
                    .pause(Pause::BatchCooldown, self.settings.batch_cooldown)
                    .await;
            }
        }

        summary.refresh = self
            .refresh(RefreshScope::AllDevices, day, self.settings.refresh_step_delay)
            .await;
        self.finish(&mut summary, None, started_at, start);
        Ok(summary)
    }

    async fn run_device_locked(
        &self,
        device_id: i64,
        day: NaiveDate,
        started_at: DateTime<Utc>,
    ) -> Result<HarvestSummary, HarvestError> {
        let start = Instant::now();
        let device = self
            .store
            .get_device(device_id)?
            .ok_or(HarvestError::DeviceNotFound(device_id))?;

        let mut summary = HarvestSummary::new(RunMode::Device, day);
        let outcome = harvest_device(
            device,
            day,
            self.store.clone(),
            self.probe.clone(),
            self.sequencer.clone(),
        )
        .await;
        summary.add_outcome(outcome);
        summary.batches = 1;

        summary.refresh = self
            .refresh(
                RefreshScope::Device(device_id),
                day,
                self.settings.single_device_refresh_delay,
            )
            .await;
        self.finish(&mut summary, Some(device_id), started_at, start);
        Ok(summary)
    }

    /// Run one batch through the pool; outcomes come back in batch order
    async fn run_batch(&self, batch: &[DeviceRow], day: NaiveDate) -> Vec<DeviceOutcome> {
        let store = self.store.clone();
        let probe = self.probe.clone();
        let sequencer = self.sequencer.clone();

        let results = self
            .pool
            .run_batch(batch.to_vec(), move |device| {
                harvest_device(device, day, store.clone(), probe.clone(), sequencer.clone())
            })
            .await;

        batch
            .iter()
            .zip(results)
            .map(|(device, result)| {
                result.unwrap_or_else(|e| {
                    error!(device_id = device.id, error = %e, "Device job failed");
                    DeviceOutcome::failed(device, e.to_string())
                })
            })
            .collect()
    }

    /// MAC, IP, VLAN id, VLAN name; a failing join is logged and the rest still run
    async fn refresh(
        &self,
        scope: RefreshScope,
        day: NaiveDate,
        delay: Duration,
    ) -> Vec<RefreshResult> {
        type RefreshFn = fn(&NhStore, RefreshScope, NaiveDate) -> Result<usize, StoreError>;
        let steps: [(&'static str, RefreshFn); 4] = [
            ("mac_address", NhStore::refresh_mac_addresses),
            ("ip_address", NhStore::refresh_ip_addresses),
            ("vlan_id", NhStore::refresh_vlan_ids),
            ("vlan_name", NhStore::refresh_vlan_names),
        ];

        let mut results = Vec::with_capacity(steps.len());
        for (index, (name, run)) in steps.into_iter().enumerate() {
            if index > 0 {
                self.pacer.pause(Pause::RefreshStep, delay).await;
            }
            let updated = match run(self.store.as_ref(), scope, day) {
                Ok(updated) => Some(updated),
                Err(e) => {
                    error!(refresh = name, error = %e, "Refresh join failed");
                    None
                }
            };
            results.push(RefreshResult { name, updated });
        }
        results
    }

    fn finish(
        &self,
        summary: &mut HarvestSummary,
        device_id: Option<i64>,
        started_at: DateTime<Utc>,
        start: Instant,
    ) {
        summary.total_duration = start.elapsed();
        let finished_at = Utc::now();
        match self
            .store
            .record_harvest_run(&summary.to_run_record(device_id, started_at, finished_at))
        {
            Ok(id) => summary.run_id = Some(id),
            Err(e) => error!(error = %e, "Failed to record harvest run"),
        }

        info!(
            mode = summary.mode.as_str(),
            devices = summary.devices_attempted,
            reachable = summary.devices_reachable,
            unreachable = summary.devices_unreachable,
            succeeded = summary.devices_succeeded,
            failed = summary.devices_failed,
            rows = summary.total_rows,
            duration_ms = summary.total_duration.as_millis(),
            "Harvest complete"
        );
    }
}
