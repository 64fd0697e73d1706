pub mod affect;
pub mod clock;
pub mod collaborators;
pub mod console;
pub mod errors;
pub mod models;
pub mod reconcile;
pub mod settings;
pub mod store;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use clock::SystemClock;
use collaborators::{ProcessLamp, ProcessPredictor};
use reconcile::{ControllerConfig, ReconcileController};
use settings::SettingsStore;
use store::ObservationStore;

pub async fn run() -> Result<()> {
    let settings_store = SettingsStore::from_env()?;
    let settings = settings_store.settings().clone();

    // Initialize logging (reads RUST_LOG env var)
    let level = if settings.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!(
        "Affect lamp starting up (config: {})",
        settings_store.path().display()
    );

    let store = ObservationStore::open(settings.store_paths())?;
    let config = ControllerConfig {
        poll_interval: settings.poll_interval(),
        normalizer: settings.normalizer()?,
        transform: settings.transform()?,
    };

    let (controller, events) = ReconcileController::new(
        config,
        store,
        ProcessPredictor::new(settings.predictor.clone()),
        ProcessLamp::new(settings.lamp.clone()),
        Arc::new(SystemClock),
    );

    // Restore the last manual observation so the display starts where it left off.
    match controller.latest_observation().await {
        Ok(Some(row)) => info!(
            "Last observation: {} at {} ({}, {})",
            row.emotion, row.timestamp, row.va.valence, row.va.arousal
        ),
        Ok(None) => info!("No stored observations yet"),
        Err(err) => warn!("Could not read the latest observation: {err:#}"),
    }

    let printer = console::spawn_event_printer(events);
    controller.spawn_poller().await;

    let console_result = console::run_console(&controller)
        .await
        .context("console loop failed");

    controller.shutdown().await;
    drop(controller);
    if let Err(err) = printer.await {
        warn!("event printer task failed: {err}");
    }

    info!("Affect lamp shut down");
    console_result
}
