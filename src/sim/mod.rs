//! Synthetic telemetry producer.
//!
//! Generates per-vehicle readings that evolve smoothly from the vehicle's
//! previous sample (speed/rpm/temperature walks, bearing-based location
//! drift, odometer accumulation), with a small chance of injecting one of
//! the fault scenarios the detector is built to catch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use crate::engine::Engine;
use crate::telemetry::SensorReading;

/// Probability that a generated reading carries an injected fault.
const FAULT_CHANCE: f64 = 0.03;

/// Fault shapes the generator can inject into an otherwise normal reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScenario {
    ExtremeSpeed,
    EngineOverrev,
    Overheating,
    SensorFailure,
    EngineStall,
    HarshAcceleration,
    HarshBraking,
    LowOilPressure,
    BatteryFault,
    FuelLeak,
}

impl FaultScenario {
    fn pick(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..10) {
            0 => FaultScenario::ExtremeSpeed,
            1 => FaultScenario::EngineOverrev,
            2 => FaultScenario::Overheating,
            3 => FaultScenario::SensorFailure,
            4 => FaultScenario::EngineStall,
            5 => FaultScenario::HarshAcceleration,
            6 => FaultScenario::HarshBraking,
            7 => FaultScenario::LowOilPressure,
            8 => FaultScenario::BatteryFault,
            _ => FaultScenario::FuelLeak,
        }
    }
}

pub struct FleetSimulator {
    rng: StdRng,
    fleet_size: u32,
}

impl FleetSimulator {
    pub fn new(fleet_size: u32) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            fleet_size,
        }
    }

    #[cfg(test)]
    pub fn with_seed(fleet_size: u32, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            fleet_size,
        }
    }

    pub fn next_vehicle(&mut self) -> u32 {
        self.rng.gen_range(1..=self.fleet_size)
    }

    pub fn maybe_fault(&mut self) -> Option<FaultScenario> {
        if self.rng.gen_bool(FAULT_CHANCE) {
            Some(FaultScenario::pick(&mut self.rng))
        } else {
            None
        }
    }

    /// Produce the next reading for `vehicle_id`, continuing from `last`
    /// when the vehicle has history.
    pub fn generate(
        &mut self,
        vehicle_id: u32,
        last: Option<&SensorReading>,
        fault: Option<FaultScenario>,
    ) -> SensorReading {
        let rng = &mut self.rng;

        let mut reading = match last {
            Some(prev) => {
                let speed = (prev.speed_kmph + rng.gen_range(-3.0..3.0)).max(0.0);
                // One tick is nominally a second apart.
                let acceleration = (speed - prev.speed_kmph) / 3.6;

                let bearing: f64 = rng.gen_range(0.0..360.0_f64).to_radians();
                let dist_km = speed / 3600.0;
                let latitude = prev.latitude + (dist_km / 111.0) * bearing.cos();
                let longitude = prev.longitude
                    + (dist_km / (111.0 * prev.latitude.to_radians().cos().max(0.01)))
                        * bearing.sin();

                let hard_maneuver = acceleration.abs() > 3.0;
                SensorReading {
                    timestamp: Utc::now(),
                    vehicle_id,
                    speed_kmph: speed,
                    rpm: (prev.rpm + rng.gen_range(-150.0..150.0)).max(0.0),
                    engine_temp_c: (prev.engine_temp_c + rng.gen_range(-0.5..0.5)).max(0.0),
                    fuel_level_pct: (prev.fuel_level_pct - 0.05).clamp(0.0, 100.0),
                    throttle_pct: rng.gen_range(0.0..100.0),
                    engine_on: true,
                    latitude,
                    longitude,
                    acceleration_ms2: acceleration,
                    brake_pressure_bar: rng.gen_range(0.0..10.0),
                    oil_pressure_bar: rng.gen_range(2.0..6.0),
                    battery_voltage: rng.gen_range(11.5..14.5),
                    odometer_km: prev.odometer_km + speed / 3600.0,
                    abs_active: hard_maneuver && rng.gen_bool(0.3),
                    traction_control_active: hard_maneuver && rng.gen_bool(0.2),
                }
            }
            None => SensorReading {
                timestamp: Utc::now(),
                vehicle_id,
                speed_kmph: rng.gen_range(20.0..120.0),
                rpm: rng.gen_range(800.0..6000.0),
                engine_temp_c: rng.gen_range(80.0..95.0),
                fuel_level_pct: rng.gen_range(5.0..95.0),
                throttle_pct: rng.gen_range(0.0..100.0),
                engine_on: true,
                latitude: rng.gen_range(40.55..40.85),
                longitude: rng.gen_range(-74.15..-73.85),
                acceleration_ms2: rng.gen_range(-2.0..2.0),
                brake_pressure_bar: rng.gen_range(0.0..10.0),
                oil_pressure_bar: rng.gen_range(2.0..6.0),
                battery_voltage: rng.gen_range(11.5..14.5),
                odometer_km: rng.gen_range(0.0..150_000.0),
                abs_active: false,
                traction_control_active: false,
            },
        };

        if let Some(fault) = fault {
            self.apply_fault(&mut reading, fault, last);
        }

        reading
    }

    fn apply_fault(
        &mut self,
        reading: &mut SensorReading,
        fault: FaultScenario,
        last: Option<&SensorReading>,
    ) {
        let rng = &mut self.rng;
        match fault {
            FaultScenario::ExtremeSpeed => {
                reading.speed_kmph = 250.0 + rng.gen_range(0.0..50.0);
            }
            FaultScenario::EngineOverrev => {
                reading.rpm = 9000.0 + rng.gen_range(0.0..2000.0);
            }
            FaultScenario::Overheating => {
                reading.engine_temp_c = 120.0 + rng.gen_range(0.0..20.0);
            }
            FaultScenario::SensorFailure => {
                reading.speed_kmph = -10.0;
            }
            FaultScenario::EngineStall => {
                reading.engine_on = false;
                reading.rpm = 0.0;
                reading.speed_kmph = 0.0;
            }
            FaultScenario::HarshAcceleration => {
                reading.acceleration_ms2 = 8.0 + rng.gen_range(0.0..4.0);
                reading.abs_active = true;
                reading.traction_control_active = true;
            }
            FaultScenario::HarshBraking => {
                reading.acceleration_ms2 = -8.0 - rng.gen_range(0.0..4.0);
                reading.brake_pressure_bar = 15.0 + rng.gen_range(0.0..5.0);
                reading.abs_active = true;
            }
            FaultScenario::LowOilPressure => {
                reading.oil_pressure_bar = 0.5 + rng.gen_range(0.0..0.3);
            }
            FaultScenario::BatteryFault => {
                reading.battery_voltage = 9.0 + rng.gen_range(0.0..1.0);
            }
            FaultScenario::FuelLeak => {
                if let Some(prev) = last {
                    reading.fuel_level_pct = (prev.fuel_level_pct - 5.0).max(0.0);
                }
            }
        }
    }
}

/// Drive the engine at roughly `rate_hz` until shutdown. While paused the
/// producer sleeps and retries; on shutdown any in-flight reading has
/// already completed before this returns.
pub async fn run_producer(engine: Arc<Engine>, mut sim: FleetSimulator, rate_hz: u64) {
    let tick = Duration::from_millis(1000 / rate_hz.max(1));
    let mut interval = tokio::time::interval(tick);
    let mut last_report = std::time::Instant::now();

    while engine.is_running() {
        if engine.is_paused() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        let vehicle_id = sim.next_vehicle();
        let last = engine.last_reading(vehicle_id);
        let fault = sim.maybe_fault();
        let reading = sim.generate(vehicle_id, last.as_ref(), fault);

        match engine.process(reading) {
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "ingest failed, stopping producer");
                break;
            }
        }

        if last_report.elapsed().as_secs() >= 60 {
            if let Ok(status) = engine.system_status() {
                info!(
                    readings = status.total_readings_processed,
                    anomalies = status.total_anomalies_detected,
                    "ingest progress"
                );
            }
            last_report = std::time::Instant::now();
        }

        interval.tick().await;
    }

    info!("producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reading_is_plausible() {
        let mut sim = FleetSimulator::with_seed(20, 7);
        let r = sim.generate(3, None, None);
        assert_eq!(r.vehicle_id, 3);
        assert!(r.is_valid());
        assert!(r.speed_kmph >= 20.0 && r.speed_kmph < 120.0);
        assert!(r.engine_on);
    }

    #[test]
    fn test_continuity_from_previous_reading() {
        let mut sim = FleetSimulator::with_seed(20, 7);
        let first = sim.generate(3, None, None);
        let second = sim.generate(3, Some(&first), None);
        assert!((second.speed_kmph - first.speed_kmph).abs() <= 3.0);
        assert!(second.odometer_km >= first.odometer_km);
        assert!(second.fuel_level_pct <= first.fuel_level_pct);
    }

    #[test]
    fn test_fault_injection_shapes() {
        let mut sim = FleetSimulator::with_seed(20, 7);
        let base = sim.generate(3, None, None);

        let overheated = sim.generate(3, Some(&base), Some(FaultScenario::Overheating));
        assert!(overheated.engine_temp_c >= 120.0);

        let stalled = sim.generate(3, Some(&base), Some(FaultScenario::EngineStall));
        assert!(!stalled.engine_on);
        assert_eq!(stalled.rpm, 0.0);

        let braking = sim.generate(3, Some(&base), Some(FaultScenario::HarshBraking));
        assert!(braking.acceleration_ms2 <= -8.0);
        assert!(braking.abs_active);
    }

    #[test]
    fn test_vehicle_ids_stay_in_fleet() {
        let mut sim = FleetSimulator::with_seed(5, 99);
        for _ in 0..200 {
            let id = sim.next_vehicle();
            assert!((1..=5).contains(&id));
        }
    }
}
