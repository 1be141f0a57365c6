//! # art-sync CLI interface
//!
//! Command parsing, argument validation and the async entrypoint. All
//! reconciliation and scheduling logic lives in `art-sync-core`; this module
//! is strictly CLI glue and orchestration.
//!
//! - For command-line users: run the installed `art-sync` binary with
//!   `--help`.
//! - For programmatic/integration use: call [`run`] with a constructed
//!   [`Cli`].

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use art_sync_core::config::{SolarConfig, SyncConfig};
use art_sync_core::fleet::Fleet;
use art_sync_core::schedule;

use crate::client::FrameConnector;
use crate::solar_preview;

/// CLI for art-sync: mirror a local artwork directory onto the photo slot
/// of networked art-mode displays.
#[derive(Parser)]
#[clap(
    name = "art-sync",
    version,
    about = "Mirror a local artwork directory onto the art-mode photo slot of networked smart displays"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the periodic synchronisation service against the configured devices
    Sync {
        /// Log every mutating action as simulated instead of performing it
        #[clap(long)]
        dry_run: bool,
        /// Run a single cycle and exit instead of looping
        #[clap(long)]
        once: bool,
    },
    /// Print hourly sun elevation and brightness for three representative
    /// dates, without contacting any device
    SolarPreview,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync { dry_run, once } => {
            let config = SyncConfig::from_env()?;
            if config.devices.is_empty() {
                bail!("no devices configured; set TV_IPS to a comma-separated address list");
            }
            config.trace_loaded();

            let config = Arc::new(config);
            let interval = config.sync_interval;
            let connector = FrameConnector::new(Arc::clone(&config));
            let fleet = Fleet::new(config, connector, dry_run);

            if once {
                let report = fleet.run_cycle().await;
                tracing::info!(
                    synced = report.synced(),
                    devices = report.devices.len(),
                    "Single cycle finished"
                );
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => tracing::debug!(json = %json, "Cycle report as JSON"),
                    Err(e) => tracing::debug!(error = %e, "Failed to serialize cycle report"),
                }
            } else {
                let shutdown = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for interrupt");
                        std::future::pending::<()>().await;
                    }
                };
                schedule::run(&fleet, interval, shutdown).await;
            }
            Ok(())
        }
        Commands::SolarPreview => match SolarConfig::from_env() {
            Ok(solar) => {
                solar_preview::run(&solar);
                Ok(())
            }
            Err(e) => {
                solar_preview::print_location_help();
                bail!("solar preview unavailable: {e}");
            }
        },
    }
}
