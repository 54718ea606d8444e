//! Append-only CSV observers for samples, anomalies, and engine
//! performance. Sinks are advisory: a failing sink logs once and ingest
//! continues without it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::telemetry::{format_timestamp, AnomalyRecord, SensorReading};

const PERFORMANCE_HEADER: &str =
    "Timestamp,TotalReadings,TotalAnomalies,ProcessingTimeMs,MemoryUsageMB";

/// One row of the performance log, emitted every N ingests.
#[derive(Debug, Clone)]
pub struct PerformanceRow {
    pub timestamp: DateTime<Utc>,
    pub total_readings: u64,
    pub total_anomalies: u64,
    pub processing_ms: f64,
    pub memory_mb: f64,
}

/// A single append-only CSV file. After the first write failure the sink
/// goes quiet for the rest of the process lifetime.
#[derive(Debug)]
struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    failed: bool,
}

impl CsvSink {
    fn open(path: PathBuf, header: &str) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("failed to create log file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{header}")
            .with_context(|| format!("failed to write header: {}", path.display()))?;
        Ok(Self {
            path,
            writer,
            failed: false,
        })
    }

    fn append(&mut self, row: &str) {
        if self.failed {
            return;
        }
        let result = writeln!(self.writer, "{row}").and_then(|_| self.writer.flush());
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "log sink failed, disabling");
            self.failed = true;
        }
    }
}

/// The three CSV observers of the engine's output side.
#[derive(Debug)]
pub struct LogSinks {
    samples: CsvSink,
    anomalies: CsvSink,
    performance: CsvSink,
}

impl LogSinks {
    /// Create (or truncate) the three log files under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
        Ok(Self {
            samples: CsvSink::open(dir.join("sensor_data.csv"), SensorReading::CSV_HEADER)?,
            anomalies: CsvSink::open(dir.join("anomalies.csv"), AnomalyRecord::CSV_HEADER)?,
            performance: CsvSink::open(dir.join("system_performance.csv"), PERFORMANCE_HEADER)?,
        })
    }

    pub fn append_reading(&mut self, reading: &SensorReading) {
        self.samples.append(&reading.csv_row());
    }

    pub fn append_anomaly(&mut self, anomaly: &AnomalyRecord) {
        self.anomalies.append(&anomaly.csv_row());
    }

    pub fn append_performance(&mut self, row: &PerformanceRow) {
        self.performance.append(&format!(
            "{},{},{},{:.2},{:.2}",
            format_timestamp(row.timestamp),
            row.total_readings,
            row.total_anomalies,
            row.processing_ms,
            row.memory_mb,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::AnomalyKind;

    fn reading() -> SensorReading {
        SensorReading {
            timestamp: Utc::now(),
            vehicle_id: 4,
            speed_kmph: 72.5,
            rpm: 3100.0,
            engine_temp_c: 88.0,
            fuel_level_pct: 45.0,
            throttle_pct: 35.0,
            engine_on: true,
            latitude: 40.7,
            longitude: -74.0,
            acceleration_ms2: 1.1,
            brake_pressure_bar: 0.0,
            oil_pressure_bar: 3.4,
            battery_voltage: 13.1,
            odometer_km: 4200.0,
            abs_active: false,
            traction_control_active: false,
        }
    }

    #[test]
    fn test_sinks_write_headers_and_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sinks = LogSinks::open(dir.path()).unwrap();

        sinks.append_reading(&reading());
        sinks.append_anomaly(&AnomalyRecord::new(
            Utc::now(),
            4,
            "speed",
            210.0,
            AnomalyKind::SpeedRange,
            "Speed outside safe range",
            4,
            None,
            0.0,
        ));
        sinks.append_performance(&PerformanceRow {
            timestamp: Utc::now(),
            total_readings: 100,
            total_anomalies: 3,
            processing_ms: 0.42,
            memory_mb: 1.5,
        });

        let samples = fs::read_to_string(dir.path().join("sensor_data.csv")).unwrap();
        let mut lines = samples.lines();
        assert_eq!(lines.next().unwrap(), SensorReading::CSV_HEADER);
        assert_eq!(lines.count(), 1);

        let anomalies = fs::read_to_string(dir.path().join("anomalies.csv")).unwrap();
        assert!(anomalies.starts_with(AnomalyRecord::CSV_HEADER));
        assert!(anomalies.contains("SPEED_RANGE"));

        let perf = fs::read_to_string(dir.path().join("system_performance.csv")).unwrap();
        assert!(perf.starts_with(PERFORMANCE_HEADER));
        assert!(perf.contains(",100,3,0.42,1.50"));
    }
}
