//! The shared fleet store: one logical region holding every per-vehicle
//! window, profile, baseline, trend buffer, and the anomaly index, guarded
//! by a single writer-exclusive lock owned by the engine.
//!
//! Everything is keyed on vehicle id; there are no cross-references between
//! the maps. Windows, baselines, trends, and anomaly lists are created
//! lazily on first contact; profiles come from the startup catalog.

pub mod profile;

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::mem::size_of;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::analysis::TrendBuffers;
use crate::config::EngineConfig;
use crate::detect::rules::{classify, RuleContext};
use crate::detect::Baseline;
use crate::telemetry::{AnomalyKind, AnomalyRecord, Geofence, SensorReading};

pub use self::profile::VehicleProfile;

#[derive(Debug)]
pub struct FleetStore {
    config: EngineConfig,
    pub(crate) windows: HashMap<u32, VecDeque<SensorReading>>,
    pub(crate) anomalies: HashMap<u32, Vec<AnomalyRecord>>,
    pub(crate) profiles: HashMap<u32, VehicleProfile>,
    pub(crate) baselines: HashMap<u32, Baseline>,
    pub(crate) trends: HashMap<u32, TrendBuffers>,
    pub(crate) geofences: Vec<Geofence>,
    /// Pending high-severity alerts, drained by the `critical` query.
    alert_queue: BinaryHeap<(u8, u32)>,
    pub(crate) total_readings_processed: u64,
    pub(crate) total_anomalies_detected: u64,
    pub(crate) dropped_readings: u64,
}

impl FleetStore {
    pub fn new(config: EngineConfig, profiles: Vec<VehicleProfile>, geofences: Vec<Geofence>) -> Self {
        Self {
            config,
            windows: HashMap::new(),
            anomalies: HashMap::new(),
            profiles: profiles.into_iter().map(|p| (p.vehicle_id, p)).collect(),
            baselines: HashMap::new(),
            trends: HashMap::new(),
            geofences,
            alert_queue: BinaryHeap::new(),
            total_readings_processed: 0,
            total_anomalies_detected: 0,
            dropped_readings: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full ingest pipeline for one reading: counters, profile
    /// aggregates, window append, trend buffers, periodic baseline retrain,
    /// classification, anomaly indexing, and the state recompute. Returns
    /// the anomalies the reading produced.
    pub fn apply_reading(&mut self, reading: &SensorReading) -> Vec<AnomalyRecord> {
        let vehicle_id = reading.vehicle_id;
        self.total_readings_processed += 1;

        // Profile aggregates. Unknown vehicles keep flowing through the
        // window and classifier, just without profile bookkeeping.
        if let Some(profile) = self.profiles.get_mut(&vehicle_id) {
            profile.observe(
                reading,
                self.config.route_history_cap,
                self.config.harsh_event_threshold_ms2,
            );
        }

        let window = self.windows.entry(vehicle_id).or_default();
        window.push_back(reading.clone());
        while window.len() > self.config.window_size {
            window.pop_front();
        }

        let trend_cap = self.config.trend_buffer_cap;
        self.trends
            .entry(vehicle_id)
            .or_insert_with(|| TrendBuffers::new(trend_cap))
            .record(reading);

        if window.len() >= self.config.baseline_retrain_window
            && self.total_readings_processed % self.config.baseline_retrain_ticks == 0
        {
            let window = &self.windows[&vehicle_id];
            let baseline = self.baselines.entry(vehicle_id).or_insert_with(Baseline::new);
            if let Err(e) = baseline.train(window, self.config.baseline_min_samples) {
                debug!(vehicle_id, error = %e, "baseline retrain skipped");
            }
        }

        let window = &self.windows[&vehicle_id];
        let previous = if window.len() >= 2 {
            window.get(window.len() - 2)
        } else {
            None
        };
        let ml_score = self
            .baselines
            .get(&vehicle_id)
            .map(|b| b.score(previous, reading))
            .unwrap_or(0.0);

        let ctx = RuleContext {
            window,
            profile: self.profiles.get(&vehicle_id),
            geofences: &self.geofences,
            ml_score,
        };
        let found = classify(reading, &ctx, &self.config);

        self.record_anomalies(vehicle_id, &found);
        self.refresh_state(vehicle_id, Utc::now());

        found
    }

    /// A reading that failed validation: counted, never indexed.
    pub fn count_dropped(&mut self) {
        self.dropped_readings += 1;
    }

    fn record_anomalies(&mut self, vehicle_id: u32, found: &[AnomalyRecord]) {
        if found.is_empty() {
            return;
        }

        let index = self.anomalies.entry(vehicle_id).or_default();
        for anomaly in found {
            index.push(anomaly.clone());
            if anomaly.severity >= self.config.alert_min_severity {
                self.alert_queue.push((anomaly.severity, vehicle_id));
            }
        }
        self.total_anomalies_detected += found.len() as u64;

        if let Some(profile) = self.profiles.get_mut(&vehicle_id) {
            profile.total_anomalies += found.len() as u64;
            if found.iter().any(|a| a.kind == AnomalyKind::Maintenance) {
                profile.state = crate::telemetry::VehicleState::Maintenance;
            }
        }
    }

    fn refresh_state(&mut self, vehicle_id: u32, now: DateTime<Utc>) {
        if let Some(profile) = self.profiles.get_mut(&vehicle_id) {
            let history = self
                .anomalies
                .get(&vehicle_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            profile.update_state(
                history,
                now,
                self.config.recent_anomaly_window_secs,
                self.config.offline_timeout_secs,
            );
        }
    }

    pub fn last_reading(&self, vehicle_id: u32) -> Option<&SensorReading> {
        self.windows.get(&vehicle_id).and_then(|w| w.back())
    }

    /// Pop all pending high-severity alerts, most severe first.
    pub fn drain_alerts(&mut self) -> Vec<(u8, u32)> {
        let mut alerts = Vec::with_capacity(self.alert_queue.len());
        while let Some(alert) = self.alert_queue.pop() {
            alerts.push(alert);
        }
        alerts
    }

    pub fn vehicle_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.profiles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Shallow structural estimate of the store's footprint; string and
    /// per-allocation overhead is not counted.
    pub fn estimated_memory_bytes(&self) -> usize {
        let windows: usize = self
            .windows
            .values()
            .map(|w| w.len() * size_of::<SensorReading>())
            .sum();
        let anomalies: usize = self
            .anomalies
            .values()
            .map(|a| a.len() * size_of::<AnomalyRecord>())
            .sum();
        let routes: usize = self
            .profiles
            .values()
            .map(|p| p.route_history.len() * size_of::<(f64, f64)>())
            .sum();
        let trends: usize = self.trends.values().map(|t| t.len() * 5 * size_of::<f64>()).sum();
        windows + anomalies + routes + trends
    }
}
