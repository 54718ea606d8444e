//! Core telemetry value types: sensor readings, anomaly records, vehicle
//! state, and the geofence table.

pub mod geo;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use geo::{haversine_km, Geofence};

/// Render a timestamp as local wall-clock time with millisecond resolution,
/// the format shared by all CSV sinks (`HH:MM:SS.mmm`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
}

fn csv_bool(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// One telemetry observation for one vehicle at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub vehicle_id: u32,
    pub speed_kmph: f64,
    pub rpm: f64,
    pub engine_temp_c: f64,
    pub fuel_level_pct: f64,
    pub throttle_pct: f64,
    pub engine_on: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub acceleration_ms2: f64,
    pub brake_pressure_bar: f64,
    pub oil_pressure_bar: f64,
    pub battery_voltage: f64,
    pub odometer_km: f64,
    pub abs_active: bool,
    pub traction_control_active: bool,
}

impl SensorReading {
    pub const CSV_HEADER: &'static str = "Timestamp,VehicleID,Speed,RPM,Temperature,FuelLevel,\
        Throttle,EngineOn,Latitude,Longitude,Acceleration,BrakePressure,OilPressure,\
        BatteryVoltage,Odometer,ABSActive,TractionControlActive";

    /// True when every numeric field is finite and the vehicle id is set.
    /// Readings failing this check are dropped by the coordinator.
    pub fn is_valid(&self) -> bool {
        self.vehicle_id != 0
            && [
                self.speed_kmph,
                self.rpm,
                self.engine_temp_c,
                self.fuel_level_pct,
                self.throttle_pct,
                self.latitude,
                self.longitude,
                self.acceleration_ms2,
                self.brake_pressure_bar,
                self.oil_pressure_bar,
                self.battery_voltage,
                self.odometer_km,
            ]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{},{}",
            format_timestamp(self.timestamp),
            self.vehicle_id,
            self.speed_kmph,
            self.rpm,
            self.engine_temp_c,
            self.fuel_level_pct,
            self.throttle_pct,
            csv_bool(self.engine_on),
            self.latitude,
            self.longitude,
            self.acceleration_ms2,
            self.brake_pressure_bar,
            self.oil_pressure_bar,
            self.battery_voltage,
            self.odometer_km,
            csv_bool(self.abs_active),
            csv_bool(self.traction_control_active),
        )
    }
}

/// Closed set of anomaly classifications emitted by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyKind {
    SpeedRange,
    RpmRange,
    TempRange,
    SpeedSpike,
    RpmSpike,
    TempSpike,
    EngineStall,
    Overheating,
    Erratic,
    SensorFail,
    FuelLeak,
    Maintenance,
    Geofence,
    HarshAccel,
    HarshBrake,
}

impl AnomalyKind {
    /// Uppercase wire token used in CSV logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::SpeedRange => "SPEED_RANGE",
            AnomalyKind::RpmRange => "RPM_RANGE",
            AnomalyKind::TempRange => "TEMP_RANGE",
            AnomalyKind::SpeedSpike => "SPEED_SPIKE",
            AnomalyKind::RpmSpike => "RPM_SPIKE",
            AnomalyKind::TempSpike => "TEMP_SPIKE",
            AnomalyKind::EngineStall => "ENGINE_STALL",
            AnomalyKind::Overheating => "OVERHEATING",
            AnomalyKind::Erratic => "ERRATIC",
            AnomalyKind::SensorFail => "SENSOR_FAIL",
            AnomalyKind::FuelLeak => "FUEL_LEAK",
            AnomalyKind::Maintenance => "MAINTENANCE",
            AnomalyKind::Geofence => "GEOFENCE",
            AnomalyKind::HarshAccel => "HARSH_ACCEL",
            AnomalyKind::HarshBrake => "HARSH_BRAKE",
        }
    }
}

/// Human-readable name for a severity level.
pub fn severity_name(severity: u8) -> &'static str {
    match severity {
        1 => "LOW",
        2 => "MINOR",
        3 => "MODERATE",
        4 => "HIGH",
        5 => "CRITICAL",
        _ => "UNKNOWN",
    }
}

/// A labeled deviation event emitted by a classifier rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub vehicle_id: u32,
    pub sensor: String,
    pub value: f64,
    pub kind: AnomalyKind,
    pub description: String,
    pub severity: u8,
    pub priority: u8,
    pub acknowledged: bool,
    pub location: Option<String>,
    pub ml_score: f64,
}

impl AnomalyRecord {
    pub const CSV_HEADER: &'static str =
        "Timestamp,VehicleID,Sensor,Value,Type,Description,Severity,Priority,Location,MLScore";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        vehicle_id: u32,
        sensor: &str,
        value: f64,
        kind: AnomalyKind,
        description: &str,
        severity: u8,
        location: Option<String>,
        ml_score: f64,
    ) -> Self {
        let severity = severity.clamp(1, 5);
        Self {
            id: Uuid::new_v4(),
            timestamp,
            vehicle_id,
            sensor: sensor.to_string(),
            value,
            kind,
            description: description.to_string(),
            severity,
            priority: severity,
            acknowledged: false,
            location,
            ml_score,
        }
    }

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{:.2},{},{},{},{},{},{:.2}",
            format_timestamp(self.timestamp),
            self.vehicle_id,
            self.sensor,
            self.value,
            self.kind.label(),
            self.description,
            self.severity,
            self.priority,
            self.location.as_deref().unwrap_or(""),
            self.ml_score,
        )
    }
}

/// Derived health state of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    Normal,
    Warning,
    Critical,
    Offline,
    Maintenance,
}

impl VehicleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleState::Normal => "NORMAL",
            VehicleState::Warning => "WARNING",
            VehicleState::Critical => "CRITICAL",
            VehicleState::Offline => "OFFLINE",
            VehicleState::Maintenance => "MAINTENANCE",
        }
    }
}
