//! Per-vehicle metadata, cumulative aggregates, and the health state
//! machine.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::telemetry::{haversine_km, AnomalyRecord, SensorReading, VehicleState};

const SPEED_SUM_METRIC: &str = "total_speed_sum";
const SPEED_COUNT_METRIC: &str = "speed_count";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleProfile {
    pub vehicle_id: u32,
    pub make_model: String,
    pub license_plate: String,
    pub state: VehicleState,
    pub last_seen: DateTime<Utc>,
    pub total_distance_km: f64,
    pub total_anomalies: u64,
    /// Present for reporting parity; no consumption model is defined, so
    /// the value stays 0.
    pub avg_fuel_efficiency: f64,
    pub route_history: VecDeque<(f64, f64)>,
    pub last_maintenance: DateTime<Utc>,
    pub maintenance_interval_km: f64,
    pub max_speed_recorded: f64,
    pub avg_speed: f64,
    pub harsh_events_count: u64,
    pub performance_metrics: HashMap<String, f64>,
}

impl VehicleProfile {
    pub fn new(
        vehicle_id: u32,
        make_model: &str,
        license_plate: &str,
        maintenance_interval_km: f64,
    ) -> Self {
        Self {
            vehicle_id,
            make_model: make_model.to_string(),
            license_plate: license_plate.to_string(),
            state: VehicleState::Normal,
            last_seen: Utc::now(),
            total_distance_km: 0.0,
            total_anomalies: 0,
            avg_fuel_efficiency: 0.0,
            route_history: VecDeque::new(),
            // Seeded a month back so freshly started fleets are not
            // immediately flagged for maintenance.
            last_maintenance: Utc::now() - Duration::days(30),
            maintenance_interval_km,
            max_speed_recorded: 0.0,
            avg_speed: 0.0,
            harsh_events_count: 0,
            performance_metrics: HashMap::new(),
        }
    }

    /// Fold one reading into the cumulative aggregates: liveness, route and
    /// distance, speed extremes and running mean, harsh-event counter.
    pub fn observe(&mut self, reading: &SensorReading, route_cap: usize, harsh_threshold: f64) {
        self.last_seen = reading.timestamp;

        if let Some(&(last_lat, last_lon)) = self.route_history.back() {
            self.total_distance_km +=
                haversine_km(last_lat, last_lon, reading.latitude, reading.longitude);
        }
        self.route_history.push_back((reading.latitude, reading.longitude));
        while self.route_history.len() > route_cap {
            self.route_history.pop_front();
        }

        self.max_speed_recorded = self.max_speed_recorded.max(reading.speed_kmph);

        let sum = self
            .performance_metrics
            .entry(SPEED_SUM_METRIC.to_string())
            .or_insert(0.0);
        *sum += reading.speed_kmph;
        let sum = *sum;
        let count = self
            .performance_metrics
            .entry(SPEED_COUNT_METRIC.to_string())
            .or_insert(0.0);
        *count += 1.0;
        self.avg_speed = sum / *count;

        if reading.acceleration_ms2.abs() > harsh_threshold {
            self.harsh_events_count += 1;
        }
    }

    /// Recompute the health state from the vehicle's recent anomalies.
    ///
    /// Severity-5 activity within the lookback wins over everything;
    /// repeated severity-4 activity degrades to WARNING; otherwise the
    /// state relaxes to NORMAL unless maintenance is pending. A silent
    /// vehicle reads as OFFLINE regardless.
    pub fn update_state(
        &mut self,
        anomalies: &[AnomalyRecord],
        now: DateTime<Utc>,
        recent_window_secs: i64,
        offline_timeout_secs: i64,
    ) {
        let mut recent_critical = 0;
        let mut recent_high = 0;
        for anomaly in anomalies {
            if (now - anomaly.timestamp).num_seconds() <= recent_window_secs {
                match anomaly.severity {
                    5 => recent_critical += 1,
                    4 => recent_high += 1,
                    _ => {}
                }
            }
        }

        if recent_critical > 0 {
            self.state = VehicleState::Critical;
        } else if recent_high > 2 {
            self.state = VehicleState::Warning;
        } else if self.state != VehicleState::Maintenance {
            self.state = VehicleState::Normal;
        }

        if (now - self.last_seen).num_seconds() > offline_timeout_secs {
            self.state = VehicleState::Offline;
        }
    }

    /// State as observed at `now`: a vehicle silent past the timeout reads
    /// as OFFLINE even though no ingest has run to record it.
    pub fn effective_state(&self, now: DateTime<Utc>, offline_timeout_secs: i64) -> VehicleState {
        if (now - self.last_seen).num_seconds() > offline_timeout_secs {
            VehicleState::Offline
        } else {
            self.state
        }
    }
}
