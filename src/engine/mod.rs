//! The ingest coordinator: the single entry point for incoming readings
//! and the read-only query surface over the shared store.
//!
//! Writes are serialized through one writer-exclusive lock; queries take
//! the read side and observe whole readings (a reader never sees a window
//! containing a sample without the anomalies it produced). The `running`
//! and `paused` flags live outside the lock so the producer can observe
//! them without contending with queries.

pub mod query;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::sinks::{LogSinks, PerformanceRow};
use crate::store::{FleetStore, VehicleProfile};
use crate::telemetry::{AnomalyRecord, Geofence, SensorReading};

#[derive(Debug, Error)]
pub enum EngineError {
    /// A writer panicked while holding the store lock. Nothing about the
    /// store can be trusted afterwards; the engine signals shutdown.
    #[error("shared store lock poisoned; engine shutting down")]
    StorePoisoned,
}

pub struct Engine {
    store: RwLock<FleetStore>,
    sinks: Option<Mutex<LogSinks>>,
    running: AtomicBool,
    paused: AtomicBool,
    system: Mutex<sysinfo::System>,
}

impl Engine {
    pub fn new(config: EngineConfig, profiles: Vec<VehicleProfile>, geofences: Vec<Geofence>) -> Self {
        Self {
            store: RwLock::new(FleetStore::new(config, profiles, geofences)),
            sinks: None,
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            system: Mutex::new(sysinfo::System::new()),
        }
    }

    pub fn with_sinks(
        config: EngineConfig,
        profiles: Vec<VehicleProfile>,
        geofences: Vec<Geofence>,
        sinks: LogSinks,
    ) -> Self {
        let mut engine = Self::new(config, profiles, geofences);
        engine.sinks = Some(Mutex::new(sinks));
        engine
    }

    /// Ingest one reading: validate, fold into the store under the write
    /// lock, then emit to the sinks. Returns the anomalies the reading
    /// produced. Invalid readings are dropped and counted, never an error.
    pub fn process(&self, reading: SensorReading) -> Result<Vec<AnomalyRecord>, EngineError> {
        let started = Instant::now();

        let (found, perf_row) = {
            let mut store = self.write_store()?;

            if !reading.is_valid() {
                store.count_dropped();
                debug!(vehicle_id = reading.vehicle_id, "dropped invalid reading");
                return Ok(Vec::new());
            }

            let found = store.apply_reading(&reading);

            let total = store.total_readings_processed;
            let perf_row = if total % store.config().performance_log_interval == 0 {
                Some(PerformanceRow {
                    timestamp: Utc::now(),
                    total_readings: total,
                    total_anomalies: store.total_anomalies_detected,
                    processing_ms: started.elapsed().as_secs_f64() * 1000.0,
                    memory_mb: store.estimated_memory_bytes() as f64 / (1024.0 * 1024.0),
                })
            } else {
                None
            };
            (found, perf_row)
        };

        // Sink writes are buffered outside the store lock; the sink mutex
        // alone preserves append order from the single producer.
        if let Some(sinks) = &self.sinks {
            if let Ok(mut sinks) = sinks.lock() {
                sinks.append_reading(&reading);
                for anomaly in &found {
                    sinks.append_anomaly(anomaly);
                }
                if let Some(row) = perf_row {
                    sinks.append_performance(&row);
                }
            }
        }

        Ok(found)
    }

    /// Most recent window entry for a vehicle; the simulator uses it to
    /// keep consecutive synthetic readings continuous.
    pub fn last_reading(&self, vehicle_id: u32) -> Option<SensorReading> {
        self.store
            .read()
            .ok()
            .and_then(|store| store.last_reading(vehicle_id).cloned())
    }

    // --- control flags ------------------------------------------------

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
        info!("ingest paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        info!("ingest resumed");
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("engine shutdown requested");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    // --- lock plumbing -------------------------------------------------

    pub(crate) fn write_store(&self) -> Result<RwLockWriteGuard<'_, FleetStore>, EngineError> {
        self.store.write().map_err(|_| self.poisoned())
    }

    pub(crate) fn read_store(&self) -> Result<RwLockReadGuard<'_, FleetStore>, EngineError> {
        self.store.read().map_err(|_| self.poisoned())
    }

    fn poisoned(&self) -> EngineError {
        warn!("store lock poisoned");
        self.running.store(false, Ordering::Relaxed);
        EngineError::StorePoisoned
    }

    /// Serialize a full fleet snapshot to `path` as pretty-printed JSON.
    pub fn export_report(&self, path: &Path) -> Result<()> {
        let report = self.fleet_report()?;
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "fleet report exported");
        Ok(())
    }

    /// Resident-set size of this process in MB, when the platform reports
    /// it.
    pub(crate) fn process_memory_mb(&self) -> f64 {
        let Ok(mut system) = self.system.lock() else {
            return 0.0;
        };
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0.0;
        };
        system.refresh_process(pid);
        system
            .process(pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    }
}
