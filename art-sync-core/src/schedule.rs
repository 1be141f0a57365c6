//! Fixed-interval scheduler around the fleet orchestrator.
//!
//! One cycle, one sleep, forever. A panicking cycle is caught and logged so
//! a single bad cycle never terminates the service. Shutdown is injected as
//! a future (the binary passes ctrl-c); it is created once and kept alive
//! across iterations, so a signal arriving mid-cycle is buffered and acted
//! on as soon as the cycle finishes.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use crate::contract::DeviceConnector;
use crate::fleet::Fleet;

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run sync cycles at the given interval until `shutdown` resolves.
///
/// Cycles are never interrupted mid-flight; the shutdown future is checked
/// between the end of a cycle and the start of the next one.
pub async fn run<C: DeviceConnector>(
    fleet: &Fleet<C>,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    loop {
        match AssertUnwindSafe(fleet.run_cycle()).catch_unwind().await {
            Ok(report) => info!(
                synced = report.synced(),
                devices = report.devices.len(),
                "Cycle finished"
            ),
            Err(payload) => {
                error!(panic = %describe_panic(payload), "Sync cycle panicked, continuing");
            }
        }

        info!(secs = interval.as_secs(), "Waiting until next sync cycle");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::config::{BrightnessPolicy, SlideshowPolicy, SyncConfig};
    use crate::contract::MockDeviceConnector;

    fn one_device_config() -> SyncConfig {
        SyncConfig {
            artwork_dir: PathBuf::from("/nonexistent"),
            devices: vec!["10.0.0.1".to_string()],
            sync_interval: Duration::from_secs(300),
            matte: None,
            token_dir: PathBuf::from("/nonexistent"),
            slideshow: SlideshowPolicy::PreserveDevice,
            brightness: BrightnessPolicy::Off,
            remove_unknown: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_raised_during_a_cycle_stops_the_loop_after_it() {
        let mut connector = MockDeviceConnector::new();
        // Exactly one cycle runs: the already-resolved shutdown future must
        // win over the interval sleep at the first wait.
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err("unreachable".into()));
        let fleet = Fleet::new(Arc::new(one_device_config()), connector, false);

        run(&fleet, Duration::from_secs(300), futures::future::ready(())).await;
    }

    #[tokio::test(start_paused = true)]
    async fn loop_keeps_cycling_until_shutdown_resolves() {
        let mut connector = MockDeviceConnector::new();
        connector
            .expect_connect()
            .times(3)
            .returning(|_| Err("unreachable".into()));
        let fleet = Fleet::new(Arc::new(one_device_config()), connector, false);

        // Resolves midway through the third interval sleep, after three
        // cycles have started.
        run(
            &fleet,
            Duration::from_secs(300),
            tokio::time::sleep(Duration::from_secs(750)),
        )
        .await;
    }
}
