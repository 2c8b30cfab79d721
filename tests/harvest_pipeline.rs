mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use common::{FakeFleet, SetProbe, StaticTelemetry, harvester, init_tracing, seed_devices, settings};
use nh_collect::{DisabledTelemetry, DiscoveredSwitch, HarvestError, Step};
use nh_store::{LockAttempt, NhStore, RunMode, Table};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

fn memory_store() -> Arc<NhStore> {
    Arc::new(NhStore::open_memory().unwrap())
}

fn snapshot_counts(store: &NhStore, device_id: i64) -> Vec<(Table, i64)> {
    Table::ALL
        .iter()
        .map(|table| (*table, store.count_rows(*table, device_id, day()).unwrap()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_run_skips_unreachable_devices() {
    init_tracing();
    let store = memory_store();
    let ids = seed_devices(&store, &["sw-a.example.net", "sw-b.example.net", "sw-c.example.net"]);
    store.insert_arp_entry("0011.2233.4455", "10.10.0.50").unwrap();
    let fleet = Arc::new(FakeFleet::new());
    let harvester = harvester(
        store.clone(),
        fleet.clone(),
        SetProbe::down(&["sw-b.example.net"]),
        Arc::new(StaticTelemetry::default()),
        settings(100, 50),
    );

    let summary = harvester.run_all(day()).await.unwrap();

    assert_eq!(summary.mode, RunMode::Full);
    assert_eq!(summary.devices_attempted, 3);
    assert_eq!(summary.devices_reachable, 2);
    assert_eq!(summary.devices_unreachable, 1);
    assert_eq!(summary.devices_succeeded, 2);
    assert_eq!(summary.devices_failed, 0);
    assert!(fleet.commands_for("sw-b.example.net").is_empty());
    assert_eq!(fleet.commands_for("sw-a.example.net").len(), 9);

    let down = store.get_device(ids[1]).unwrap().unwrap();
    assert_eq!(down.reachable, Some(false));
    assert!(down.version.is_none());
    assert_eq!(store.count_rows(Table::Interfaces, ids[1], day()).unwrap(), 0);

    let up = store.get_device(ids[0]).unwrap().unwrap();
    assert_eq!(up.reachable, Some(true));
    assert_eq!(up.version.as_deref(), Some("17.9.4a"));
    assert_eq!(up.hardware.as_deref(), Some("C9300-48P"));
    assert_eq!(up.serial.as_deref(), Some("FOC1234X0AB"));

    let counts: Vec<i64> = snapshot_counts(&store, ids[0]).into_iter().map(|(_, n)| n).collect();
    assert!(counts.iter().all(|n| *n > 0), "every table written: {counts:?}");

    let rows = store.interfaces_for_device(ids[0], day()).unwrap();
    let access = rows.iter().find(|r| r.interface == "Gi1/0/1").unwrap();
    assert_eq!(access.mac_address.as_deref(), Some("0011.2233.4455"));
    assert_eq!(access.ip_address.as_deref(), Some("10.10.0.50"));
    assert_eq!(access.vlan_id.as_deref(), Some("10"));
    assert_eq!(access.vlan_name.as_deref(), Some("STAFF"));
    let uplink = rows.iter().find(|r| r.interface == "Te1/1/1").unwrap();
    assert_eq!(uplink.vlan_id.as_deref(), Some("trunk"));
    assert!(uplink.vlan_name.is_none());

    let runs = store.list_harvest_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(Some(runs[0].id.unwrap()), summary.run_id);
    assert_eq!(runs[0].devices_total, 3);
    assert_eq!(runs[0].devices_unreachable, 1);
    assert_eq!(runs[0].devices_succeeded, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mac_table_excludes_connected_trunks() {
    init_tracing();
    let store = memory_store();
    seed_devices(&store, &["sw-a.example.net"]);
    let fleet = Arc::new(FakeFleet::new());
    let harvester = harvester(
        store.clone(),
        fleet.clone(),
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(100, 50),
    );

    harvester.run_all(day()).await.unwrap();

    let commands = fleet.commands_for("sw-a.example.net");
    assert_eq!(
        commands.last().map(String::as_str),
        Some("show mac address-table | exclude _Te1/1/1_|_CPU_")
    );
    assert_eq!(commands[0], "show running-config");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_pool_size() {
    init_tracing();
    let store = memory_store();
    let fqdns: Vec<String> = (0..12).map(|i| format!("sw-{i:02}.example.net")).collect();
    let names: Vec<&str> = fqdns.iter().map(String::as_str).collect();
    seed_devices(&store, &names);
    let fleet = Arc::new(FakeFleet::new().with_delay(Duration::from_millis(20)));
    let harvester = harvester(
        store.clone(),
        fleet,
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(5, 3),
    );

    let summary = harvester.run_all(day()).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.devices_succeeded, 12);
    let stats = harvester.pool_stats();
    // every batch has more devices than slots, so the pool fills up
    assert_eq!(stats.peak(), 3, "peak {}", stats.peak());
    assert_eq!(stats.acquired(), 12);
    assert_eq!(stats.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn device_failure_is_isolated_and_keeps_snapshot() {
    init_tracing();
    let store = memory_store();
    let ids = seed_devices(&store, &["sw-a.example.net", "sw-b.example.net", "sw-c.example.net"]);

    // first pass populates every device
    let healthy = harvester(
        store.clone(),
        Arc::new(FakeFleet::new()),
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(100, 50),
    );
    healthy.run_all(day()).await.unwrap();
    let before = store.count_rows(Table::Interfaces, ids[1], day()).unwrap();
    assert_eq!(before, 2);

    let fleet = Arc::new(FakeFleet::new().failing("sw-b.example.net", "show interfaces"));
    let flaky = harvester(
        store.clone(),
        fleet.clone(),
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(100, 50),
    );
    let summary = flaky.run_all(day()).await.unwrap();

    assert_eq!(summary.devices_succeeded, 2);
    assert_eq!(summary.devices_failed, 1);
    let failed = summary
        .outcomes
        .iter()
        .find(|o| o.device_id == ids[1])
        .unwrap();
    let report = failed.report.as_ref().unwrap();
    assert_eq!(report.failed_step(), Some(Step::Interfaces));
    assert!(report.error.as_deref().unwrap().contains("Invalid input"));

    // the aborted device issued nothing after the failing command
    let commands = fleet.commands_for("sw-b.example.net");
    assert_eq!(commands.last().map(String::as_str), Some("show interfaces"));
    assert_eq!(commands.len(), 3);

    // the earlier snapshot survives the failed step
    assert_eq!(store.count_rows(Table::Interfaces, ids[1], day()).unwrap(), before);
    assert_eq!(fleet.commands_for("sw-c.example.net").len(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rerun_on_same_day_is_idempotent() {
    init_tracing();
    let store = memory_store();
    let ids = seed_devices(&store, &["sw-a.example.net", "sw-b.example.net"]);
    let harvester = harvester(
        store.clone(),
        Arc::new(FakeFleet::new()),
        SetProbe::default(),
        Arc::new(StaticTelemetry::default()),
        settings(1, 2),
    );

    harvester.run_all(day()).await.unwrap();
    let first: Vec<_> = ids.iter().map(|id| snapshot_counts(&store, *id)).collect();
    harvester.run_all(day()).await.unwrap();
    let second: Vec<_> = ids.iter().map(|id| snapshot_counts(&store, *id)).collect();

    assert_eq!(first, second);
    assert_eq!(store.list_harvest_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn held_lock_rejects_run_and_stale_lock_is_taken_over() {
    init_tracing();
    let store = memory_store();
    seed_devices(&store, &["sw-a.example.net"]);
    let fleet = Arc::new(FakeFleet::new());
    let harvester = harvester(
        store.clone(),
        fleet.clone(),
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(100, 50),
    )
    .with_holder("nh-test");

    let stale_after = harvester.settings().run_lock_stale_after;
    store
        .try_acquire_run_lock("nh-other", Utc::now(), stale_after)
        .unwrap();
    let err = harvester.run_all(day()).await.unwrap_err();
    assert!(matches!(err, HarvestError::RunInProgress { ref holder, .. } if holder == "nh-other"));
    assert!(fleet.issued().is_empty());
    assert!(store.list_harvest_runs(10).unwrap().is_empty());

    store.release_run_lock("nh-other").unwrap();
    let long_ago = Utc::now() - chrono::Duration::hours(7);
    store
        .try_acquire_run_lock("nh-crashed", long_ago, stale_after)
        .unwrap();
    let summary = harvester.run_all(day()).await.unwrap();
    assert_eq!(summary.devices_succeeded, 1);

    // released on completion
    let next = store
        .try_acquire_run_lock("nh-next", Utc::now(), stale_after)
        .unwrap();
    assert_eq!(next, LockAttempt::Acquired);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reconciliation_adds_discovered_switches() {
    init_tracing();
    let store = memory_store();
    let ids = seed_devices(&store, &["sw-a.example.net"]);
    let telemetry = StaticTelemetry {
        switches: vec![
            DiscoveredSwitch {
                name: "sw-a.example.net".to_string(),
                ip: "10.0.0.1".to_string(),
            },
            DiscoveredSwitch {
                name: "sw-new.example.net".to_string(),
                ip: "10.0.0.9".to_string(),
            },
        ],
    };
    let mut harvest_settings = settings(100, 50);
    harvest_settings.reconcile_inventory = true;
    let harvester = harvester(
        store.clone(),
        Arc::new(FakeFleet::new()),
        SetProbe::default(),
        Arc::new(telemetry),
        harvest_settings,
    );

    let summary = harvester.run_all(day()).await.unwrap();

    assert_eq!(summary.devices_discovered, 1);
    assert_eq!(summary.devices_attempted, 2);
    let devices = store.list_devices().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].fqdn, "sw-new.example.net");
    assert_eq!(devices[1].ip_address.as_deref(), Some("10.0.0.9"));
    assert_eq!(
        store.count_rows(Table::InterfaceUsage, ids[0], day()).unwrap(),
        1
    );
}

#[tokio::test]
async fn single_device_run_touches_only_that_device() {
    init_tracing();
    let store = memory_store();
    let ids = seed_devices(&store, &["sw-a.example.net", "sw-b.example.net"]);
    let fleet = Arc::new(FakeFleet::new());
    let harvester = harvester(
        store.clone(),
        fleet.clone(),
        SetProbe::default(),
        Arc::new(DisabledTelemetry),
        settings(100, 50),
    );

    let summary = harvester.run_device(ids[1], day()).await.unwrap();

    assert_eq!(summary.mode, RunMode::Device);
    assert_eq!(summary.devices_succeeded, 1);
    assert!(fleet.commands_for("sw-a.example.net").is_empty());
    assert_eq!(store.count_rows(Table::Interfaces, ids[0], day()).unwrap(), 0);
    assert_eq!(store.count_rows(Table::Interfaces, ids[1], day()).unwrap(), 2);
    assert!(store.get_device(ids[0]).unwrap().unwrap().reachable.is_none());
}

#[tokio::test]
async fn file_backed_store_persists_between_opens() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = common::temp_config(&dir);
    let device_id = {
        let store = Arc::new(NhStore::open(&config.global.db_path).unwrap());
        let ids = seed_devices(&store, &["sw-a.example.net"]);
        let harvester = harvester(
            store.clone(),
            Arc::new(FakeFleet::new()),
            SetProbe::default(),
            Arc::new(DisabledTelemetry),
            settings(100, 50),
        );
        harvester.run_all(day()).await.unwrap();
        ids[0]
    };

    let reopened = NhStore::open(&config.global.db_path).unwrap();
    assert_eq!(reopened.count_rows(Table::Interfaces, device_id, day()).unwrap(), 2);
    assert_eq!(reopened.list_harvest_runs(5).unwrap().len(), 1);
}
