//! Engine configuration: every detection constant in one place, with
//! sensible compiled-in defaults, TOML override, and an environment
//! variable for the config file path.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Root configuration for the detection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sliding-window capacity per vehicle (samples).
    pub window_size: usize,
    /// Cap on each per-field trend buffer (values).
    pub trend_buffer_cap: usize,
    /// Cap on per-vehicle route history (points).
    pub route_history_cap: usize,
    /// Samples required before a baseline can be trained.
    pub baseline_min_samples: usize,
    /// Window length that first triggers baseline training.
    pub baseline_retrain_window: usize,
    /// Global ingest ticks between baseline retrains.
    pub baseline_retrain_ticks: u64,
    /// Seconds without a sample before a vehicle reads as OFFLINE.
    pub offline_timeout_secs: i64,
    /// Lookback for the state machine's recent-anomaly counts (seconds).
    pub recent_anomaly_window_secs: i64,
    /// Minimum severity pushed onto the pending alert queue.
    pub alert_min_severity: u8,
    /// Ingest ticks between performance log rows.
    pub performance_log_interval: u64,
    /// |acceleration| above which a harsh event is counted on the profile.
    pub harsh_event_threshold_ms2: f64,
    /// Default maintenance interval for seeded profiles (km).
    pub maintenance_interval_km: f64,
    /// Days since last maintenance before the maintenance rule fires.
    pub maintenance_interval_days: i64,
    pub thresholds: RuleThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 200,
            trend_buffer_cap: 200,
            route_history_cap: 1000,
            baseline_min_samples: 50,
            baseline_retrain_window: 100,
            baseline_retrain_ticks: 100,
            offline_timeout_secs: 30,
            recent_anomaly_window_secs: 300,
            alert_min_severity: 4,
            performance_log_interval: 100,
            harsh_event_threshold_ms2: 4.0,
            maintenance_interval_km: 10_000.0,
            maintenance_interval_days: 90,
            thresholds: RuleThresholds::default(),
        }
    }
}

/// Fixed trip points for the instantaneous classifier rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub speed_max_kmph: f64,
    pub speed_min_kmph: f64,
    pub rpm_max: f64,
    /// RPM below this while the engine is on and the vehicle is moving
    /// reads as a range violation.
    pub rpm_stall: f64,
    pub stall_speed_kmph: f64,
    pub temp_max_c: f64,
    pub harsh_accel_ms2: f64,
    pub oil_pressure_min_bar: f64,
    pub battery_min_v: f64,
    pub battery_max_v: f64,
    /// Fuel drop rate (percent per minute) above which a leak is flagged.
    pub fuel_drop_pct_per_min: f64,
    /// Baseline deviation score above which ERRATIC fires.
    pub ml_score: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            speed_max_kmph: 200.0,
            speed_min_kmph: -5.0,
            rpm_max: 8000.0,
            rpm_stall: 400.0,
            stall_speed_kmph: 10.0,
            temp_max_c: 110.0,
            harsh_accel_ms2: 6.0,
            oil_pressure_min_bar: 1.0,
            battery_min_v: 11.0,
            battery_max_v: 15.0,
            fuel_drop_pct_per_min: 2.0,
            ml_score: 3.0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order: an explicit path, the
    /// `FLEETMEDIC_CONFIG` environment variable, the standard system
    /// location, and finally compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var("FLEETMEDIC_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "FLEETMEDIC_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/fleetmedic/fleetmedic.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_detection_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.window_size, 200);
        assert_eq!(cfg.trend_buffer_cap, 200);
        assert_eq!(cfg.route_history_cap, 1000);
        assert_eq!(cfg.baseline_min_samples, 50);
        assert_eq!(cfg.baseline_retrain_window, 100);
        assert_eq!(cfg.baseline_retrain_ticks, 100);
        assert_eq!(cfg.offline_timeout_secs, 30);
        assert_eq!(cfg.recent_anomaly_window_secs, 300);
        assert_eq!(cfg.maintenance_interval_km, 10_000.0);
        assert_eq!(cfg.maintenance_interval_days, 90);

        let t = &cfg.thresholds;
        assert_eq!(t.speed_max_kmph, 200.0);
        assert_eq!(t.speed_min_kmph, -5.0);
        assert_eq!(t.rpm_max, 8000.0);
        assert_eq!(t.temp_max_c, 110.0);
        assert_eq!(t.harsh_accel_ms2, 6.0);
        assert_eq!(t.fuel_drop_pct_per_min, 2.0);
        assert_eq!(t.ml_score, 3.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
window_size = 50

[thresholds]
temp_max_c = 105.0
"#,
        )
        .unwrap();

        assert_eq!(cfg.window_size, 50);
        assert_eq!(cfg.thresholds.temp_max_c, 105.0);
        // Everything else stays default.
        assert_eq!(cfg.trend_buffer_cap, 200);
        assert_eq!(cfg.thresholds.rpm_max, 8000.0);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.window_size, EngineConfig::default().window_size);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(EngineConfig::load(Path::new("/nonexistent/fleetmedic.toml")).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let back: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.window_size, cfg.window_size);
        assert_eq!(back.thresholds.battery_max_v, cfg.thresholds.battery_max_v);
    }
}
