//! Bounded per-field value buffers backing the on-demand statistics.

use crate::analysis::stats::SeriesStats;
use crate::telemetry::SensorReading;

/// Capped history of recent values for each analyzed sensor field of one
/// vehicle. Oldest values are evicted once the cap is reached.
#[derive(Debug, Clone)]
pub struct TrendBuffers {
    cap: usize,
    speed: Vec<f64>,
    rpm: Vec<f64>,
    temperature: Vec<f64>,
    fuel: Vec<f64>,
    acceleration: Vec<f64>,
}

impl TrendBuffers {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            speed: Vec::new(),
            rpm: Vec::new(),
            temperature: Vec::new(),
            fuel: Vec::new(),
            acceleration: Vec::new(),
        }
    }

    pub fn record(&mut self, reading: &SensorReading) {
        Self::push_capped(&mut self.speed, reading.speed_kmph, self.cap);
        Self::push_capped(&mut self.rpm, reading.rpm, self.cap);
        Self::push_capped(&mut self.temperature, reading.engine_temp_c, self.cap);
        Self::push_capped(&mut self.fuel, reading.fuel_level_pct, self.cap);
        Self::push_capped(&mut self.acceleration, reading.acceleration_ms2, self.cap);
    }

    fn push_capped(buf: &mut Vec<f64>, value: f64, cap: usize) {
        buf.push(value);
        if buf.len() > cap {
            buf.remove(0);
        }
    }

    pub fn speed_stats(&self) -> SeriesStats {
        SeriesStats::compute(&self.speed)
    }

    pub fn rpm_stats(&self) -> SeriesStats {
        SeriesStats::compute(&self.rpm)
    }

    pub fn temperature_stats(&self) -> SeriesStats {
        SeriesStats::compute(&self.temperature)
    }

    pub fn fuel_stats(&self) -> SeriesStats {
        SeriesStats::compute(&self.fuel)
    }

    pub fn acceleration_stats(&self) -> SeriesStats {
        SeriesStats::compute(&self.acceleration)
    }

    pub fn len(&self) -> usize {
        self.speed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(speed: f64) -> SensorReading {
        SensorReading {
            timestamp: Utc::now(),
            vehicle_id: 1,
            speed_kmph: speed,
            rpm: 2000.0,
            engine_temp_c: 90.0,
            fuel_level_pct: 50.0,
            throttle_pct: 20.0,
            engine_on: true,
            latitude: 0.0,
            longitude: 0.0,
            acceleration_ms2: 0.0,
            brake_pressure_bar: 0.0,
            oil_pressure_bar: 3.0,
            battery_voltage: 12.5,
            odometer_km: 0.0,
            abs_active: false,
            traction_control_active: false,
        }
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut trends = TrendBuffers::new(5);
        for i in 0..8 {
            trends.record(&reading(i as f64));
        }
        assert_eq!(trends.len(), 5);
        let stats = trends.speed_stats();
        // Values 3..=7 remain.
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 7.0);
    }

    #[test]
    fn test_stats_track_recorded_values() {
        let mut trends = TrendBuffers::new(200);
        for speed in [40.0, 50.0, 60.0] {
            trends.record(&reading(speed));
        }
        assert_eq!(trends.speed_stats().mean, 50.0);
        assert_eq!(trends.rpm_stats().mean, 2000.0);
    }
}
