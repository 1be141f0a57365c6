//! Fleet cycles exercised against mocked connectors and device sessions.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use art_sync_core::config::{BrightnessPolicy, SlideshowPolicy, SyncConfig};
use art_sync_core::contract::{MockArtDevice, MockDeviceConnector, PowerAndMode};
use art_sync_core::fleet::{DeviceStatus, Fleet};

fn fleet_config(artwork_dir: &Path, token_dir: &Path, devices: &[&str]) -> SyncConfig {
    SyncConfig {
        artwork_dir: artwork_dir.to_path_buf(),
        devices: devices.iter().map(|d| d.to_string()).collect(),
        sync_interval: Duration::from_secs(300),
        matte: None,
        token_dir: token_dir.to_path_buf(),
        slideshow: SlideshowPolicy::PreserveDevice,
        brightness: BrightnessPolicy::Off,
        remove_unknown: false,
    }
}

fn idle_device(address: &str) -> MockArtDevice {
    let mut device = MockArtDevice::new();
    device.expect_address().return_const(address.to_string());
    device
        .expect_power_and_mode()
        .returning(|| {
            Ok(PowerAndMode {
                powered_on: true,
                art_mode: Some(true),
            })
        });
    device.expect_list_inventory().returning(|| Ok(vec![]));
    device.expect_close().times(1).returning(|| ());
    device
}

#[tokio::test(start_paused = true)]
async fn unreachable_device_does_not_abort_its_siblings() {
    let artwork = tempfile::tempdir().unwrap();
    let tokens = tempfile::tempdir().unwrap();
    let config = Arc::new(fleet_config(
        artwork.path(),
        tokens.path(),
        &["10.0.0.1", "10.0.0.2"],
    ));

    let mut connector = MockDeviceConnector::new();
    connector
        .expect_connect()
        .returning(|address: &str| match address {
            "10.0.0.1" => Err("connection timed out".into()),
            other => Ok(idle_device(other)),
        });

    let fleet = Fleet::new(config, connector, false);
    let report = fleet.run_cycle().await;

    assert_eq!(report.devices.len(), 2);
    assert!(matches!(
        report
            .devices
            .iter()
            .find(|d| d.address == "10.0.0.1")
            .unwrap()
            .status,
        DeviceStatus::Unreachable
    ));
    assert!(matches!(
        report
            .devices
            .iter()
            .find(|d| d.address == "10.0.0.2")
            .unwrap()
            .status,
        DeviceStatus::Synced(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn device_outside_art_mode_is_skipped_but_still_closed() {
    let artwork = tempfile::tempdir().unwrap();
    let tokens = tempfile::tempdir().unwrap();
    let config = Arc::new(fleet_config(artwork.path(), tokens.path(), &["10.0.0.3"]));

    let mut connector = MockDeviceConnector::new();
    connector.expect_connect().returning(|address: &str| {
        let mut device = MockArtDevice::new();
        device.expect_address().return_const(address.to_string());
        device.expect_power_and_mode().returning(|| {
            Ok(PowerAndMode {
                powered_on: true,
                art_mode: Some(false),
            })
        });
        // No inventory call: a skipped device is never mutated or queried
        // beyond availability, but its session must still be closed.
        device.expect_close().times(1).returning(|| ());
        Ok(device)
    });

    let fleet = Fleet::new(config, connector, false);
    let report = fleet.run_cycle().await;

    assert!(matches!(report.devices[0].status, DeviceStatus::Skipped));
    assert_eq!(report.synced(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreadable_mode_state_fails_open() {
    let artwork = tempfile::tempdir().unwrap();
    let tokens = tempfile::tempdir().unwrap();
    let config = Arc::new(fleet_config(artwork.path(), tokens.path(), &["10.0.0.4"]));

    let mut connector = MockDeviceConnector::new();
    connector.expect_connect().returning(|address: &str| {
        let mut device = MockArtDevice::new();
        device.expect_address().return_const(address.to_string());
        device
            .expect_power_and_mode()
            .returning(|| Err("no such endpoint on this model".into()));
        device.expect_list_inventory().returning(|| Ok(vec![]));
        device.expect_close().times(1).returning(|| ());
        Ok(device)
    });

    let fleet = Fleet::new(config, connector, false);
    let report = fleet.run_cycle().await;

    assert!(matches!(report.devices[0].status, DeviceStatus::Synced(_)));
}

#[tokio::test(start_paused = true)]
async fn cycle_with_no_reachable_devices_is_not_an_error() {
    let artwork = tempfile::tempdir().unwrap();
    let tokens = tempfile::tempdir().unwrap();
    let config = Arc::new(fleet_config(artwork.path(), tokens.path(), &["10.0.0.5"]));

    let mut connector = MockDeviceConnector::new();
    connector
        .expect_connect()
        .returning(|_: &str| Err("unreachable".into()));

    let fleet = Fleet::new(config, connector, false);
    let report = fleet.run_cycle().await;

    assert_eq!(report.synced(), 0);
    assert!(matches!(report.devices[0].status, DeviceStatus::Unreachable));
}
