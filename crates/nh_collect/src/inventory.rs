//! Inventory reconciliation against the telemetry source

use crate::telemetry::{DiscoveredSwitch, TelemetrySource};
use crate::HarvestError;
use nh_store::{DeviceRow, NewDevice, NhStore};
use tracing::info;

/// Discovered switches whose name contains none of the known fqdns.
///
/// Known rows with an empty fqdn are ignored, since an empty string would
/// match every name.
#[must_use]
pub fn missing_switches(known: &[DeviceRow], discovered: &[DiscoveredSwitch]) -> Vec<NewDevice> {
    let fqdns: Vec<&str> = known
        .iter()
        .map(|d| d.fqdn.as_str())
        .filter(|fqdn| !fqdn.is_empty())
        .collect();

    discovered
        .iter()
        .filter(|sw| !fqdns.iter().any(|fqdn| sw.name.contains(fqdn)))
        .map(|sw| NewDevice {
            fqdn: sw.name.clone(),
            ip_address: Some(sw.ip.clone()).filter(|ip| !ip.is_empty()),
        })
        .collect()
}

/// Insert every discovered-but-unknown switch; returns how many were added.
///
/// # Errors
///
/// Returns [`HarvestError`] if the telemetry source or the store fails.
pub async fn reconcile(
    store: &NhStore,
    telemetry: &dyn TelemetrySource,
) -> Result<usize, HarvestError> {
    let discovered = telemetry.switch_list().await?;
    let known = store.list_devices()?;
    let missing = missing_switches(&known, &discovered);

    if !missing.is_empty() {
        store.insert_devices(&missing)?;
    }
    info!(
        discovered = discovered.len(),
        inserted = missing.len(),
        "Inventory reconciled"
    );
    Ok(missing.len())
}
