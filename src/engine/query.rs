//! Read-only snapshot queries over the shared store.
//!
//! Each query takes the store lock once and returns owned data, so results
//! are internally consistent even while ingest continues.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::SeriesStats;
use crate::engine::{Engine, EngineError};
use crate::store::VehicleProfile;
use crate::telemetry::{AnomalyRecord, VehicleState};

/// One row of the `vehicles` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummary {
    pub vehicle_id: u32,
    pub make_model: String,
    pub license_plate: String,
    pub state: VehicleState,
    pub last_seen: DateTime<Utc>,
    pub total_distance_km: f64,
    pub total_anomalies: u64,
}

/// Full analytics snapshot for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleAnalytics {
    pub vehicle_id: u32,
    pub profile: VehicleProfile,
    /// State as observed at query time (liveness applied).
    pub state: VehicleState,
    pub window_len: usize,
    pub speed: SeriesStats,
    pub rpm: SeriesStats,
    pub temperature: SeriesStats,
    pub fuel: SeriesStats,
    pub acceleration: SeriesStats,
    pub severity_histogram: BTreeMap<u8, u64>,
    pub kind_histogram: BTreeMap<String, u64>,
    pub insights: Vec<String>,
}

/// Counters and resource figures for the `status` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub running: bool,
    pub paused: bool,
    pub total_readings_processed: u64,
    pub total_anomalies_detected: u64,
    pub dropped_readings: u64,
    pub active_vehicles: usize,
    pub geofence_count: usize,
    pub estimated_store_bytes: usize,
    pub process_memory_mb: f64,
}

/// Serialized snapshot written by `export_report`.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub generated_at: DateTime<Utc>,
    pub status: SystemStatus,
    pub vehicles: Vec<VehicleReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleReportEntry {
    pub vehicle_id: u32,
    pub make_model: String,
    pub license_plate: String,
    pub state: VehicleState,
    pub total_distance_km: f64,
    pub total_anomalies: u64,
    pub harsh_events_count: u64,
    pub max_speed_recorded: f64,
    pub avg_speed: f64,
}

impl Engine {
    /// All known vehicles with their query-time state, id-ordered.
    pub fn list_vehicles(&self) -> Result<Vec<VehicleSummary>, EngineError> {
        let store = self.read_store()?;
        let now = Utc::now();
        let offline = store.config().offline_timeout_secs;

        let mut summaries: Vec<VehicleSummary> = store
            .profiles
            .values()
            .map(|p| VehicleSummary {
                vehicle_id: p.vehicle_id,
                make_model: p.make_model.clone(),
                license_plate: p.license_plate.clone(),
                state: p.effective_state(now, offline),
                last_seen: p.last_seen,
                total_distance_km: p.total_distance_km,
                total_anomalies: p.total_anomalies,
            })
            .collect();
        summaries.sort_by_key(|s| s.vehicle_id);
        Ok(summaries)
    }

    /// Analytics snapshot for one vehicle, or `None` before any data has
    /// arrived for it.
    pub fn analytics(&self, vehicle_id: u32) -> Result<Option<VehicleAnalytics>, EngineError> {
        let store = self.read_store()?;

        let window_len = store.windows.get(&vehicle_id).map(|w| w.len()).unwrap_or(0);
        let Some(profile) = store.profiles.get(&vehicle_id) else {
            return Ok(None);
        };
        if window_len == 0 {
            return Ok(None);
        }

        let trends = store.trends.get(&vehicle_id);
        let speed = trends.map(|t| t.speed_stats()).unwrap_or_default();
        let rpm = trends.map(|t| t.rpm_stats()).unwrap_or_default();
        let temperature = trends.map(|t| t.temperature_stats()).unwrap_or_default();
        let fuel = trends.map(|t| t.fuel_stats()).unwrap_or_default();
        let acceleration = trends.map(|t| t.acceleration_stats()).unwrap_or_default();

        let mut severity_histogram = BTreeMap::new();
        let mut kind_histogram = BTreeMap::new();
        if let Some(anomalies) = store.anomalies.get(&vehicle_id) {
            for anomaly in anomalies {
                *severity_histogram.entry(anomaly.severity).or_insert(0u64) += 1;
                *kind_histogram
                    .entry(anomaly.kind.label().to_string())
                    .or_insert(0u64) += 1;
            }
        }

        let insights = build_insights(profile, &speed, &temperature);
        let state = profile.effective_state(Utc::now(), store.config().offline_timeout_secs);

        Ok(Some(VehicleAnalytics {
            vehicle_id,
            profile: profile.clone(),
            state,
            window_len,
            speed,
            rpm,
            temperature,
            fuel,
            acceleration,
            severity_histogram,
            kind_histogram,
            insights,
        }))
    }

    /// Most recent anomalies for a vehicle, newest first.
    pub fn anomalies(&self, vehicle_id: u32, limit: usize) -> Result<Vec<AnomalyRecord>, EngineError> {
        let store = self.read_store()?;
        let mut recent: Vec<AnomalyRecord> = store
            .anomalies
            .get(&vehicle_id)
            .map(|a| a.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(recent)
    }

    /// Drain the pending high-severity alert queue and resolve each entry
    /// to the vehicle's newest anomaly at that severity. Most severe
    /// first; duplicates collapse to one row.
    pub fn critical_alerts(&self) -> Result<Vec<AnomalyRecord>, EngineError> {
        let mut store = self.write_store()?;
        let pending = store.drain_alerts();

        let mut seen = HashSet::new();
        let mut alerts = Vec::new();
        for (severity, vehicle_id) in pending {
            if !seen.insert((severity, vehicle_id)) {
                continue;
            }
            let latest = store
                .anomalies
                .get(&vehicle_id)
                .and_then(|a| a.iter().rev().find(|x| x.severity == severity))
                .cloned();
            if let Some(anomaly) = latest {
                alerts.push(anomaly);
            }
        }
        Ok(alerts)
    }

    pub fn system_status(&self) -> Result<SystemStatus, EngineError> {
        let store = self.read_store()?;
        Ok(SystemStatus {
            running: self.is_running(),
            paused: self.is_paused(),
            total_readings_processed: store.total_readings_processed,
            total_anomalies_detected: store.total_anomalies_detected,
            dropped_readings: store.dropped_readings,
            active_vehicles: store.profiles.len(),
            geofence_count: store.geofences.len(),
            estimated_store_bytes: store.estimated_memory_bytes(),
            process_memory_mb: self.process_memory_mb(),
        })
    }

    pub(crate) fn fleet_report(&self) -> Result<FleetReport, EngineError> {
        let status = self.system_status()?;
        let store = self.read_store()?;
        let now = Utc::now();
        let offline = store.config().offline_timeout_secs;

        let mut vehicles: Vec<VehicleReportEntry> = store
            .profiles
            .values()
            .map(|p| VehicleReportEntry {
                vehicle_id: p.vehicle_id,
                make_model: p.make_model.clone(),
                license_plate: p.license_plate.clone(),
                state: p.effective_state(now, offline),
                total_distance_km: p.total_distance_km,
                total_anomalies: p.total_anomalies,
                harsh_events_count: p.harsh_events_count,
                max_speed_recorded: p.max_speed_recorded,
                avg_speed: p.avg_speed,
            })
            .collect();
        vehicles.sort_by_key(|v| v.vehicle_id);

        Ok(FleetReport {
            generated_at: Utc::now(),
            status,
            vehicles,
        })
    }
}

/// Trend-slope hints shown alongside the analytics tables.
fn build_insights(
    profile: &VehicleProfile,
    speed: &SeriesStats,
    temperature: &SeriesStats,
) -> Vec<String> {
    let mut insights = Vec::new();

    if speed.trend_slope > 0.1 {
        insights.push(format!(
            "Speed trend increasing (+{:.2} km/h per reading)",
            speed.trend_slope
        ));
    } else if speed.trend_slope < -0.1 {
        insights.push(format!(
            "Speed trend decreasing ({:.2} km/h per reading)",
            speed.trend_slope
        ));
    }

    if temperature.trend_slope > 0.05 {
        insights.push(format!(
            "Engine temperature rising (+{:.2} C per reading)",
            temperature.trend_slope
        ));
    }

    if profile.total_distance_km > profile.maintenance_interval_km * 0.9 {
        insights.push(format!(
            "Maintenance due soon ({:.0} km remaining)",
            profile.maintenance_interval_km - profile.total_distance_km
        ));
    }

    insights
}
