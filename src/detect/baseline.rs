//! Per-vehicle multivariate baseline ("ML score").
//!
//! The model is an online z-score profile over seven features derived from
//! consecutive sample pairs. Scoring returns the Euclidean norm of the
//! element-wise z-scores; an untrained model always scores 0.

use std::collections::VecDeque;

use chrono::{Datelike, Local, Timelike};

use crate::detect::DetectError;
use crate::telemetry::SensorReading;

pub const FEATURE_COUNT: usize = 7;

/// Guards the z-score division against zero-variance features.
const VARIANCE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Default)]
pub struct Baseline {
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
    trained_samples: usize,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        self.trained_samples > 0
    }

    pub fn trained_samples(&self) -> usize {
        self.trained_samples
    }

    /// Recompute per-feature means and population standard deviations from
    /// the window's consecutive sample pairs.
    pub fn train(
        &mut self,
        window: &VecDeque<SensorReading>,
        min_samples: usize,
    ) -> Result<(), DetectError> {
        if window.len() < min_samples {
            return Err(DetectError::InsufficientBaseline {
                needed: min_samples,
                have: window.len(),
            });
        }

        let mut features = Vec::with_capacity(window.len() - 1);
        for i in 1..window.len() {
            features.push(feature_vector(Some(&window[i - 1]), &window[i]));
        }

        let count = features.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        for fv in &features {
            for (m, v) in means.iter_mut().zip(fv.iter()) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= count;
        }

        let mut stds = [0.0; FEATURE_COUNT];
        for fv in &features {
            for ((s, v), m) in stds.iter_mut().zip(fv.iter()).zip(means.iter()) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / count).sqrt();
        }

        self.means = means;
        self.stds = stds;
        self.trained_samples = features.len();
        Ok(())
    }

    /// Normalized deviation of `current` from the trained profile. The fuel
    /// consumption feature is derived against `previous` when available.
    pub fn score(&self, previous: Option<&SensorReading>, current: &SensorReading) -> f64 {
        if !self.is_trained() {
            return 0.0;
        }

        let fv = feature_vector(previous, current);
        let mut distance = 0.0;
        for ((v, m), s) in fv.iter().zip(self.means.iter()).zip(self.stds.iter()) {
            let z = (v - m) / (s + VARIANCE_EPSILON);
            distance += z * z;
        }
        distance.sqrt()
    }
}

/// Build the seven-element feature vector for one sample.
fn feature_vector(previous: Option<&SensorReading>, current: &SensorReading) -> [f64; FEATURE_COUNT] {
    let fuel_rate = previous
        .map(|prev| {
            let dt = (current.timestamp - prev.timestamp).num_seconds();
            if dt > 0 {
                (prev.fuel_level_pct - current.fuel_level_pct) / dt as f64
            } else {
                0.0
            }
        })
        .unwrap_or(0.0);

    let local = current.timestamp.with_timezone(&Local);
    let time_of_day = local.hour() as f64 + local.minute() as f64 / 60.0;
    let day_of_week = local.weekday().num_days_from_sunday() as f64;

    [
        current.speed_kmph,
        current.rpm,
        current.engine_temp_c,
        current.acceleration_ms2,
        fuel_rate,
        time_of_day,
        day_of_week,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn reading_at(offset_secs: i64, speed: f64, fuel: f64) -> SensorReading {
        SensorReading {
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            vehicle_id: 1,
            speed_kmph: speed,
            rpm: 2200.0,
            engine_temp_c: 90.0,
            fuel_level_pct: fuel,
            throttle_pct: 25.0,
            engine_on: true,
            latitude: 40.0,
            longitude: -74.0,
            acceleration_ms2: 0.2,
            brake_pressure_bar: 0.0,
            oil_pressure_bar: 3.0,
            battery_voltage: 12.5,
            odometer_km: 100.0,
            abs_active: false,
            traction_control_active: false,
        }
    }

    fn steady_window(len: usize) -> VecDeque<SensorReading> {
        (0..len)
            .map(|i| reading_at(i as i64, 60.0 + (i % 3) as f64, 80.0 - i as f64 * 0.01))
            .collect()
    }

    #[test]
    fn test_untrained_scores_zero() {
        let baseline = Baseline::new();
        assert_eq!(baseline.score(None, &reading_at(0, 250.0, 10.0)), 0.0);
    }

    #[test]
    fn test_train_requires_min_samples() {
        let mut baseline = Baseline::new();
        let window = steady_window(49);
        let err = baseline.train(&window, 50).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InsufficientBaseline { needed: 50, have: 49 }
        ));
        assert!(!baseline.is_trained());
    }

    #[test]
    fn test_deviant_sample_scores_higher() {
        let mut baseline = Baseline::new();
        let window = steady_window(100);
        baseline.train(&window, 50).unwrap();
        assert_eq!(baseline.trained_samples(), 99);

        let prev = window.back().cloned().unwrap();
        let typical = reading_at(100, 61.0, prev.fuel_level_pct);
        let wild = {
            let mut r = reading_at(100, 190.0, prev.fuel_level_pct);
            r.rpm = 7500.0;
            r.acceleration_ms2 = 5.0;
            r
        };

        let typical_score = baseline.score(Some(&prev), &typical);
        let wild_score = baseline.score(Some(&prev), &wild);
        assert!(wild_score > typical_score);
        assert!(typical_score >= 0.0);
    }

    #[test]
    fn test_nonpositive_dt_zeroes_fuel_rate() {
        let prev = reading_at(10, 60.0, 80.0);
        let cur = reading_at(10, 60.0, 40.0); // same timestamp
        let fv = feature_vector(Some(&prev), &cur);
        assert_eq!(fv[4], 0.0);
    }
}
