//! # fleet: one synchronisation cycle across all configured devices
//!
//! The orchestrator connects to every configured device independently,
//! filters the survivors by availability (powered on and passively showing
//! art), snapshots the local artwork directory exactly once, fans
//! reconciliation out across the eligible devices, and finally closes every
//! connected session regardless of outcome. Partial-fleet failure is
//! expected: one device's error never touches its siblings.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::artwork;
use crate::brightness::{brightness_from_elevation, elevation_degrees};
use crate::config::{BrightnessPolicy, SyncConfig};
use crate::contract::{ArtDevice, DeviceConnector};
use crate::reconcile::{Reconciler, SyncReport};

/// Parse the comma-separated device address list: order-preserving, with
/// blanks and duplicates stripped.
pub fn parse_device_list(raw: &str) -> Vec<String> {
    let mut devices = Vec::new();
    for part in raw.split(',') {
        let address = part.trim();
        if address.is_empty() || devices.iter().any(|d| d == address) {
            continue;
        }
        devices.push(address.to_string());
    }
    devices
}

/// Per-device outcome of one cycle.
#[derive(Debug, serde::Serialize)]
pub enum DeviceStatus {
    /// Connect failed or timed out; retried naturally next cycle.
    Unreachable,
    /// Connected but powered off or in foreground use; left untouched.
    Skipped,
    Synced(SyncReport),
    /// Reconciliation aborted partway; siblings were unaffected.
    Failed(String),
}

#[derive(Debug, serde::Serialize)]
pub struct DeviceOutcome {
    pub address: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct CycleReport {
    pub devices: Vec<DeviceOutcome>,
}

impl CycleReport {
    pub fn synced(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| matches!(d.status, DeviceStatus::Synced(_)))
            .count()
    }
}

/// The per-cycle brightness value shared by every device in the cycle:
/// solar-derived when enabled, otherwise the manual level, otherwise none.
pub fn cycle_brightness(config: &SyncConfig) -> Option<u8> {
    match &config.brightness {
        BrightnessPolicy::Off => None,
        BrightnessPolicy::Manual(level) => Some(*level),
        BrightnessPolicy::Solar(solar) => {
            let elevation = elevation_degrees(solar.latitude, solar.longitude, Utc::now());
            let level = brightness_from_elevation(
                elevation,
                solar.brightness_min,
                solar.brightness_max,
            );
            debug!(elevation, level, "Computed solar brightness for this cycle");
            Some(level)
        }
    }
}

async fn available_for_sync<D: ArtDevice>(device: &D) -> bool {
    match device.power_and_mode().await {
        Ok(state) => {
            if !state.available_for_sync() {
                info!(
                    device = device.address(),
                    powered_on = state.powered_on,
                    art_mode = ?state.art_mode,
                    "Device is not available for sync this cycle"
                );
            }
            state.available_for_sync()
        }
        Err(e) => {
            // Fail open: an unreadable mode state never blocks a sync.
            debug!(device = device.address(), error = %e, "Could not determine power/art-mode state, assuming available");
            true
        }
    }
}

/// Fleet orchestrator: owns the connector and the immutable configuration.
pub struct Fleet<C: DeviceConnector> {
    config: Arc<SyncConfig>,
    connector: C,
    dry_run: bool,
}

impl<C: DeviceConnector> Fleet<C> {
    pub fn new(config: Arc<SyncConfig>, connector: C, dry_run: bool) -> Self {
        Fleet {
            config,
            connector,
            dry_run,
        }
    }

    /// Run one full cycle. Never fails: device errors are contained in the
    /// report, and a cycle with zero reachable devices simply logs and
    /// returns.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.config.devices.is_empty() {
            warn!("No devices configured, nothing to sync");
            return report;
        }
        info!(
            devices = self.config.devices.len(),
            dry_run = self.dry_run,
            "Starting sync cycle"
        );

        // Independent concurrent connects; failures only exclude that device.
        let attempts = join_all(self.config.devices.iter().map(|address| async move {
            match self.connector.connect(address).await {
                Ok(device) => Some((address.clone(), device)),
                Err(e) => {
                    warn!(device = %address, error = %e, "Failed to connect (device may be off)");
                    None
                }
            }
        }))
        .await;

        let mut connected: Vec<(String, C::Device)> = Vec::new();
        for (address, attempt) in self.config.devices.iter().zip(attempts) {
            match attempt {
                Some(pair) => connected.push(pair),
                None => report.devices.push(DeviceOutcome {
                    address: address.clone(),
                    status: DeviceStatus::Unreachable,
                }),
            }
        }

        if connected.is_empty() {
            warn!("No devices are currently reachable");
            return report;
        }

        let availability =
            join_all(connected.iter().map(|(_, device)| available_for_sync(device))).await;

        // One snapshot per cycle, shared read-only, so every device converges
        // toward the same target set even if the directory changes mid-cycle.
        let local: Arc<BTreeSet<String>> =
            Arc::new(artwork::list_local_images(&self.config.artwork_dir));
        let brightness = cycle_brightness(&self.config);

        let outcomes = join_all(connected.iter().zip(availability).map(
            |((address, device), available)| {
                let local = Arc::clone(&local);
                async move {
                    if !available {
                        return DeviceOutcome {
                            address: address.clone(),
                            status: DeviceStatus::Skipped,
                        };
                    }
                    let mut reconciler = Reconciler::new(device, &self.config, self.dry_run);
                    let status = match reconciler.run(&local, brightness).await {
                        Ok(sync) => DeviceStatus::Synced(sync),
                        Err(e) => {
                            error!(device = %address, error = %e, "Reconciliation failed for device");
                            DeviceStatus::Failed(e.to_string())
                        }
                    };
                    DeviceOutcome {
                        address: address.clone(),
                        status,
                    }
                }
            },
        ))
        .await;
        report.devices.extend(outcomes);

        // Close every connected session, including ones excluded from
        // reconciliation.
        join_all(connected.iter().map(|(_, device)| device.close())).await;

        info!(
            synced = report.synced(),
            total = report.devices.len(),
            "Sync cycle completed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_list_strips_blanks_and_duplicates_preserving_order() {
        let parsed = parse_device_list(" 10.0.0.2, ,10.0.0.1,10.0.0.2,,10.0.0.3 ");
        assert_eq!(parsed, ["10.0.0.2", "10.0.0.1", "10.0.0.3"]);
    }

    #[test]
    fn empty_device_list_parses_to_empty() {
        assert!(parse_device_list("").is_empty());
        assert!(parse_device_list(" , ,").is_empty());
    }
}
