//! The anomaly rule set.
//!
//! Rules are independent: each is evaluated against the incoming reading
//! and may emit one anomaly; a single reading can produce several. The
//! per-sample baseline score is stamped onto every record the reading
//! produces, whether or not the rule itself consulted the baseline.

use std::collections::VecDeque;

use chrono::Duration;

use crate::config::EngineConfig;
use crate::store::VehicleProfile;
use crate::telemetry::{AnomalyKind, AnomalyRecord, Geofence, SensorReading};

/// Number of trailing window samples inspected by the fuel-leak rule.
const FUEL_LEAK_SPAN: usize = 10;

/// Read-only inputs the classifier needs besides the reading itself.
pub struct RuleContext<'a> {
    pub window: &'a VecDeque<SensorReading>,
    pub profile: Option<&'a VehicleProfile>,
    pub geofences: &'a [Geofence],
    /// Baseline deviation score computed once for this reading.
    pub ml_score: f64,
}

/// Evaluate every rule against `reading`, in fixed order, without
/// short-circuiting. Profile-dependent rules are skipped for vehicles
/// without a profile.
pub fn classify(
    reading: &SensorReading,
    ctx: &RuleContext<'_>,
    config: &EngineConfig,
) -> Vec<AnomalyRecord> {
    let t = &config.thresholds;
    let mut anomalies = Vec::new();

    let mut emit = |sensor: &str,
                    value: f64,
                    kind: AnomalyKind,
                    description: &str,
                    severity: u8,
                    location: Option<String>| {
        anomalies.push(AnomalyRecord::new(
            reading.timestamp,
            reading.vehicle_id,
            sensor,
            value,
            kind,
            description,
            severity,
            location,
            ctx.ml_score,
        ));
    };

    // Speed range
    if reading.speed_kmph > t.speed_max_kmph || reading.speed_kmph < t.speed_min_kmph {
        emit(
            "speed",
            reading.speed_kmph,
            AnomalyKind::SpeedRange,
            "Speed outside safe range",
            4,
            None,
        );
    }

    // RPM range, including the moving-with-dead-rpm case
    if reading.rpm > t.rpm_max
        || (reading.rpm < t.rpm_stall
            && reading.engine_on
            && reading.speed_kmph > t.stall_speed_kmph)
    {
        emit(
            "rpm",
            reading.rpm,
            AnomalyKind::RpmRange,
            "RPM outside normal range",
            3,
            None,
        );
    }

    // Engine temperature ceiling
    if reading.engine_temp_c > t.temp_max_c {
        emit(
            "temperature",
            reading.engine_temp_c,
            AnomalyKind::TempRange,
            "Engine overheating detected",
            5,
            None,
        );
    }

    // Harsh acceleration and braking
    if reading.acceleration_ms2 > t.harsh_accel_ms2 {
        emit(
            "acceleration",
            reading.acceleration_ms2,
            AnomalyKind::HarshAccel,
            "Harsh acceleration detected",
            3,
            None,
        );
    } else if reading.acceleration_ms2 < -t.harsh_accel_ms2 {
        emit(
            "acceleration",
            reading.acceleration_ms2,
            AnomalyKind::HarshBrake,
            "Harsh braking detected",
            3,
            None,
        );
    }

    // Oil pressure while running
    if reading.oil_pressure_bar < t.oil_pressure_min_bar && reading.engine_on {
        emit(
            "oil_pressure",
            reading.oil_pressure_bar,
            AnomalyKind::SensorFail,
            "Critically low oil pressure",
            5,
            None,
        );
    }

    // Battery voltage window
    if reading.battery_voltage < t.battery_min_v || reading.battery_voltage > t.battery_max_v {
        emit(
            "battery",
            reading.battery_voltage,
            AnomalyKind::SensorFail,
            "Battery voltage abnormal",
            3,
            None,
        );
    }

    // Sustained fuel drop over the recent window
    if ctx.window.len() >= FUEL_LEAK_SPAN {
        let rate = fuel_drop_rate(ctx.window);
        if rate > t.fuel_drop_pct_per_min {
            emit(
                "fuel",
                rate,
                AnomalyKind::FuelLeak,
                "Potential fuel leak detected",
                4,
                None,
            );
        }
    }

    // Baseline deviation
    if ctx.ml_score > t.ml_score {
        emit(
            "ml_pattern",
            ctx.ml_score,
            AnomalyKind::Erratic,
            "Unusual behavior pattern detected",
            3,
            None,
        );
    }

    // Restricted geofences
    for fence in ctx.geofences {
        if fence.restricted && fence.contains(reading.latitude, reading.longitude) {
            let description = format!("Vehicle entered restricted area: {}", fence.name);
            emit(
                "location",
                0.0,
                AnomalyKind::Geofence,
                &description,
                4,
                Some(fence.name.clone()),
            );
        }
    }

    // Maintenance due, by distance or elapsed time
    if let Some(profile) = ctx.profile {
        let overdue_km = profile.total_distance_km > profile.maintenance_interval_km;
        let overdue_time = reading.timestamp - profile.last_maintenance
            > Duration::days(config.maintenance_interval_days);
        if overdue_km || overdue_time {
            emit(
                "maintenance",
                profile.total_distance_km,
                AnomalyKind::Maintenance,
                "Scheduled maintenance due",
                2,
                None,
            );
        }
    }

    anomalies
}

/// Fuel percentage lost per whole minute across the last ten window
/// samples. Returns 0 when the samples span less than a minute.
pub fn fuel_drop_rate(window: &VecDeque<SensorReading>) -> f64 {
    if window.len() < FUEL_LEAK_SPAN {
        return 0.0;
    }

    let oldest = &window[window.len() - FUEL_LEAK_SPAN];
    let newest = &window[window.len() - 1];

    let minutes = (newest.timestamp - oldest.timestamp).num_minutes();
    if minutes <= 0 {
        return 0.0;
    }

    (oldest.fuel_level_pct - newest.fuel_level_pct) / minutes as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn quiet_reading() -> SensorReading {
        SensorReading {
            timestamp: Utc::now(),
            vehicle_id: 7,
            speed_kmph: 60.0,
            rpm: 2500.0,
            engine_temp_c: 90.0,
            fuel_level_pct: 70.0,
            throttle_pct: 25.0,
            engine_on: true,
            latitude: 10.0,
            longitude: 10.0,
            acceleration_ms2: 0.0,
            brake_pressure_bar: 0.0,
            oil_pressure_bar: 3.0,
            battery_voltage: 12.5,
            odometer_km: 100.0,
            abs_active: false,
            traction_control_active: false,
        }
    }

    fn classify_alone(reading: &SensorReading) -> Vec<AnomalyRecord> {
        let window = VecDeque::new();
        let ctx = RuleContext {
            window: &window,
            profile: None,
            geofences: &[],
            ml_score: 0.0,
        };
        classify(reading, &ctx, &EngineConfig::default())
    }

    #[test]
    fn test_quiet_reading_is_clean() {
        assert!(classify_alone(&quiet_reading()).is_empty());
    }

    #[test]
    fn test_speed_threshold_is_strict() {
        let mut r = quiet_reading();
        r.speed_kmph = 200.0;
        assert!(classify_alone(&r).is_empty());

        r.speed_kmph = 200.01;
        let found = classify_alone(&r);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::SpeedRange);
        assert_eq!(found[0].severity, 4);

        r.speed_kmph = -6.0;
        assert_eq!(classify_alone(&r)[0].kind, AnomalyKind::SpeedRange);
    }

    #[test]
    fn test_temp_threshold_is_strict() {
        let mut r = quiet_reading();
        r.engine_temp_c = 110.0;
        assert!(classify_alone(&r).is_empty());

        r.engine_temp_c = 110.01;
        let found = classify_alone(&r);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::TempRange);
        assert_eq!(found[0].severity, 5);
    }

    #[test]
    fn test_rpm_stall_requires_motion_and_ignition() {
        let mut r = quiet_reading();
        r.rpm = 300.0;
        r.speed_kmph = 50.0;
        assert_eq!(classify_alone(&r)[0].kind, AnomalyKind::RpmRange);

        // Same rpm while parked is not anomalous.
        r.speed_kmph = 5.0;
        assert!(classify_alone(&r).is_empty());

        // Nor with the engine off.
        r.speed_kmph = 50.0;
        r.engine_on = false;
        assert!(classify_alone(&r).is_empty());
    }

    #[test]
    fn test_harsh_accel_and_brake_split_on_sign() {
        let mut r = quiet_reading();
        r.acceleration_ms2 = 13.9;
        let found = classify_alone(&r);
        assert_eq!(found[0].kind, AnomalyKind::HarshAccel);
        assert_eq!(found[0].severity, 3);

        r.acceleration_ms2 = -8.0;
        assert_eq!(classify_alone(&r)[0].kind, AnomalyKind::HarshBrake);
    }

    #[test]
    fn test_oil_pressure_only_matters_running() {
        let mut r = quiet_reading();
        r.oil_pressure_bar = 0.5;
        let found = classify_alone(&r);
        assert_eq!(found[0].kind, AnomalyKind::SensorFail);
        assert_eq!(found[0].severity, 5);

        r.engine_on = false;
        r.rpm = 0.0;
        r.speed_kmph = 0.0;
        assert!(classify_alone(&r).is_empty());
    }

    #[test]
    fn test_battery_window() {
        let mut r = quiet_reading();
        r.battery_voltage = 10.5;
        assert_eq!(classify_alone(&r)[0].sensor, "battery");
        r.battery_voltage = 15.5;
        assert_eq!(classify_alone(&r)[0].sensor, "battery");
    }

    #[test]
    fn test_fuel_leak_needs_rate_and_span() {
        // Ten samples over two minutes, fuel 80 -> 60: 10 percent per minute.
        let start = Utc::now() - Duration::seconds(200);
        let window: VecDeque<SensorReading> = (0..10)
            .map(|i| {
                let mut r = quiet_reading();
                r.timestamp = start + Duration::seconds(i * 14);
                r.fuel_level_pct = 80.0 - i as f64 * (20.0 / 9.0);
                r
            })
            .collect();

        assert!((fuel_drop_rate(&window) - 10.0).abs() < 0.01);

        let current = window.back().cloned().unwrap();
        let ctx = RuleContext {
            window: &window,
            profile: None,
            geofences: &[],
            ml_score: 0.0,
        };
        let found = classify(&current, &ctx, &EngineConfig::default());
        assert!(found.iter().any(|a| a.kind == AnomalyKind::FuelLeak && a.severity == 4));
    }

    #[test]
    fn test_fuel_drop_rate_zero_for_instant_window() {
        let now = Utc::now();
        let window: VecDeque<SensorReading> = (0..10)
            .map(|i| {
                let mut r = quiet_reading();
                r.timestamp = now;
                r.fuel_level_pct = 80.0 - i as f64 * 5.0;
                r
            })
            .collect();
        assert_eq!(fuel_drop_rate(&window), 0.0);
    }

    #[test]
    fn test_ml_score_fires_erratic_and_stamps_all() {
        let mut r = quiet_reading();
        r.speed_kmph = 210.0; // also trips the speed range rule
        let window = VecDeque::new();
        let ctx = RuleContext {
            window: &window,
            profile: None,
            geofences: &[],
            ml_score: 3.5,
        };
        let found = classify(&r, &ctx, &EngineConfig::default());
        assert!(found.iter().any(|a| a.kind == AnomalyKind::Erratic));
        // The one score is stamped on every record from this reading.
        assert!(found.iter().all(|a| (a.ml_score - 3.5).abs() < 1e-12));
    }

    #[test]
    fn test_restricted_geofence_carries_location() {
        let fences = vec![
            Geofence::new("Downtown Area", 40.7128, -74.006, 5.0, false),
            Geofence::new("School Zone", 40.7589, -73.9851, 1.0, true),
        ];
        let mut r = quiet_reading();
        r.latitude = 40.759;
        r.longitude = -73.9852;

        let window = VecDeque::new();
        let ctx = RuleContext {
            window: &window,
            profile: None,
            geofences: &fences,
            ml_score: 0.0,
        };
        let found = classify(&r, &ctx, &EngineConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::Geofence);
        assert_eq!(found[0].location.as_deref(), Some("School Zone"));
        assert_eq!(found[0].severity, 4);
    }

    #[test]
    fn test_maintenance_by_distance_and_by_age() {
        let config = EngineConfig::default();
        let mut profile = VehicleProfile::new(7, "Nissan Altima", "STU-901", 10_000.0);
        let r = quiet_reading();
        let window = VecDeque::new();

        profile.total_distance_km = 10_001.0;
        let ctx = RuleContext {
            window: &window,
            profile: Some(&profile),
            geofences: &[],
            ml_score: 0.0,
        };
        let found = classify(&r, &ctx, &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::Maintenance);
        assert_eq!(found[0].severity, 2);

        profile.total_distance_km = 100.0;
        profile.last_maintenance = Utc::now() - Duration::days(91);
        let ctx = RuleContext {
            window: &window,
            profile: Some(&profile),
            geofences: &[],
            ml_score: 0.0,
        };
        assert_eq!(classify(&r, &ctx, &config).len(), 1);

        // No profile: rule is skipped entirely.
        let ctx = RuleContext {
            window: &window,
            profile: None,
            geofences: &[],
            ml_score: 0.0,
        };
        assert!(classify(&r, &ctx, &config).is_empty());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let mut r = quiet_reading();
        r.speed_kmph = 210.0;
        r.battery_voltage = 10.0;
        let a = classify_alone(&r);
        let b = classify_alone(&r);
        let kinds_a: Vec<_> = a.iter().map(|x| (x.kind, x.severity, x.value.to_bits())).collect();
        let kinds_b: Vec<_> = b.iter().map(|x| (x.kind, x.severity, x.value.to_bits())).collect();
        assert_eq!(kinds_a, kinds_b);
    }

    #[test]
    fn test_multiple_rules_fire_together() {
        let mut r = quiet_reading();
        r.speed_kmph = 210.0;
        r.engine_temp_c = 115.0;
        r.acceleration_ms2 = 7.0;
        let found = classify_alone(&r);
        let kinds: Vec<_> = found.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AnomalyKind::SpeedRange));
        assert!(kinds.contains(&AnomalyKind::TempRange));
        assert!(kinds.contains(&AnomalyKind::HarshAccel));
        assert_eq!(found.len(), 3);
    }
}
