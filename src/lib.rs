//! Fleetmedic -- online anomaly detection for vehicle telemetry streams.
//!
//! This crate provides the core library for the streaming ingest engine:
//! per-vehicle sliding windows, rolling statistics, a multivariate z-score
//! baseline, the rule classifier, geofencing, CSV log sinks, and the
//! interactive query shell.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod engine;
pub mod shell;
pub mod sim;
pub mod sinks;
pub mod store;
pub mod telemetry;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::sim::FleetSimulator;
use crate::sinks::LogSinks;

/// Start the full system: engine with CSV sinks, synthetic producer at
/// `rate_hz`, and the interactive shell. Returns after `quit` once the
/// producer has drained.
pub async fn run(config: EngineConfig, rate_hz: u64, log_dir: &Path) -> Result<()> {
    let sinks = LogSinks::open(log_dir)?;
    let profiles = catalog::seed_profiles(&config);
    let geofences = catalog::seed_geofences();
    let fleet_size = profiles.len() as u32;

    let engine = Arc::new(Engine::with_sinks(config, profiles, geofences, sinks));

    let producer = {
        let engine = engine.clone();
        let simulator = FleetSimulator::new(fleet_size);
        tokio::spawn(async move {
            sim::run_producer(engine, simulator, rate_hz).await;
        })
    };

    shell::run_shell(engine.clone()).await?;

    // `quit` clears the running flag; wait for the in-flight tick.
    producer.await?;

    if let Ok(status) = engine.system_status() {
        tracing::info!(
            readings = status.total_readings_processed,
            anomalies = status.total_anomalies_detected,
            "shutdown complete"
        );
        println!(
            "Final statistics: {} readings processed, {} anomalies detected.",
            status.total_readings_processed, status.total_anomalies_detected
        );
    }

    Ok(())
}
