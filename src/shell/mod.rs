//! Interactive command shell over stdin.
//!
//! The shell is a read-mostly observer of the engine plus the pause /
//! resume / quit controls. Output formatting lives here; the engine only
//! hands back snapshot values.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::analysis::SeriesStats;
use crate::engine::Engine;
use crate::telemetry::{format_timestamp, severity_name};

const HELP_TEXT: &str = "\
Available commands:
  analytics <id>     - Analytics and statistics for one vehicle
  anomalies <id>     - Recent anomalies for one vehicle
  critical           - Drain pending high-severity alerts
  status             - System counters and resource usage
  vehicles           - List all vehicles
  report <filename>  - Export a fleet report (JSON)
  pause / resume     - Control the ingest producer
  help               - Show this help
  quit               - Shut down";

/// How many anomaly rows the `anomalies` command prints.
const ANOMALY_LIST_LIMIT: usize = 20;

/// Run the command loop until `quit` or end of input. Returns once the
/// engine has been asked to shut down.
pub async fn run_shell(engine: Arc<Engine>) -> Result<()> {
    println!("Fleetmedic vehicle telematics monitor");
    println!("{HELP_TEXT}\n");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let Some(line) = lines.next_line().await? else {
            // stdin closed: treat like quit so headless runs terminate.
            engine.shutdown();
            break;
        };

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "analytics" => match parse_id(parts.next()) {
                Some(id) => print_analytics(&engine, id)?,
                None => println!("usage: analytics <vehicle-id>"),
            },
            "anomalies" => match parse_id(parts.next()) {
                Some(id) => print_anomalies(&engine, id)?,
                None => println!("usage: anomalies <vehicle-id>"),
            },
            "critical" => print_critical(&engine)?,
            "status" => print_status(&engine)?,
            "vehicles" => print_vehicles(&engine)?,
            "report" => match parts.next() {
                Some(filename) => match engine.export_report(std::path::Path::new(filename)) {
                    Ok(()) => println!("Report exported to {filename}"),
                    Err(e) => println!("Report export failed: {e:#}"),
                },
                None => println!("usage: report <filename>"),
            },
            "pause" => {
                engine.pause();
                println!("Ingest paused.");
            }
            "resume" => {
                engine.resume();
                println!("Ingest resumed.");
            }
            "help" => println!("{HELP_TEXT}"),
            "quit" => {
                println!("Shutting down...");
                engine.shutdown();
                break;
            }
            other => println!("Unknown command '{other}'. Type 'help' for available commands."),
        }
    }

    Ok(())
}

fn parse_id(arg: Option<&str>) -> Option<u32> {
    arg.and_then(|s| s.parse().ok())
}

fn print_stat_line(name: &str, stats: &SeriesStats, unit: &str) {
    println!(
        "{name:<13} mean {:>8.2} {unit:<5} stddev {:>7.2}  p95 {:>8.2}  cv {:>5.2}  outliers {:>3}  trend {:>7.3}",
        stats.mean, stats.std_deviation, stats.percentile_95, stats.coefficient_of_variation,
        stats.outlier_count, stats.trend_slope,
    );
}

fn print_analytics(engine: &Engine, vehicle_id: u32) -> Result<()> {
    let Some(analytics) = engine.analytics(vehicle_id)? else {
        println!("Vehicle {vehicle_id} not found or no data available.");
        return Ok(());
    };

    let p = &analytics.profile;
    println!("\n=== Vehicle {vehicle_id}: {} ({}) ===", p.make_model, p.license_plate);
    println!("State:          {}", analytics.state.as_str());
    println!("Total distance: {:.2} km", p.total_distance_km);
    println!("Average speed:  {:.2} km/h", p.avg_speed);
    println!("Max speed:      {:.2} km/h", p.max_speed_recorded);
    println!("Harsh events:   {}", p.harsh_events_count);
    println!("Data points:    {}", analytics.window_len);

    println!();
    print_stat_line("Speed", &analytics.speed, "km/h");
    print_stat_line("RPM", &analytics.rpm, "rpm");
    print_stat_line("Temperature", &analytics.temperature, "C");
    print_stat_line("Fuel", &analytics.fuel, "%");
    print_stat_line("Acceleration", &analytics.acceleration, "m/s2");

    println!("\nAnomalies: {} total", p.total_anomalies);
    for (severity, count) in &analytics.severity_histogram {
        println!("  severity {severity} ({}): {count}", severity_name(*severity));
    }
    for (kind, count) in &analytics.kind_histogram {
        println!("  {kind}: {count}");
    }

    if !analytics.insights.is_empty() {
        println!();
        for insight in &analytics.insights {
            println!("* {insight}");
        }
    }
    println!();
    Ok(())
}

fn print_anomalies(engine: &Engine, vehicle_id: u32) -> Result<()> {
    let anomalies = engine.anomalies(vehicle_id, ANOMALY_LIST_LIMIT)?;
    if anomalies.is_empty() {
        println!("No anomalies recorded for vehicle {vehicle_id}.");
        return Ok(());
    }

    println!("\n{:<14} {:<12} {:<14} {:>9}  Description", "Time", "Type", "Sensor", "Value");
    for a in &anomalies {
        println!(
            "{:<14} {:<12} {:<14} {:>9.2}  {} [sev {}]",
            format_timestamp(a.timestamp),
            a.kind.label(),
            a.sensor,
            a.value,
            a.description,
            a.severity,
        );
    }
    println!();
    Ok(())
}

fn print_critical(engine: &Engine) -> Result<()> {
    let alerts = engine.critical_alerts()?;
    if alerts.is_empty() {
        println!("No pending critical alerts.");
        return Ok(());
    }

    println!("\nPending high-severity alerts:");
    for a in &alerts {
        println!(
            "  [{}] vehicle {} {} - {} ({})",
            severity_name(a.severity),
            a.vehicle_id,
            a.kind.label(),
            a.description,
            format_timestamp(a.timestamp),
        );
    }
    println!();
    Ok(())
}

fn print_status(engine: &Engine) -> Result<()> {
    let status = engine.system_status()?;
    println!("\n=== System status ===");
    println!("Running:          {}", if status.running { "yes" } else { "no" });
    println!("Paused:           {}", if status.paused { "yes" } else { "no" });
    println!("Total readings:   {}", status.total_readings_processed);
    println!("Total anomalies:  {}", status.total_anomalies_detected);
    println!("Dropped readings: {}", status.dropped_readings);
    println!("Active vehicles:  {}", status.active_vehicles);
    println!("Geofences:        {}", status.geofence_count);
    println!(
        "Store estimate:   {:.2} MB",
        status.estimated_store_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("Process RSS:      {:.2} MB\n", status.process_memory_mb);
    Ok(())
}

fn print_vehicles(engine: &Engine) -> Result<()> {
    let vehicles = engine.list_vehicles()?;
    println!("\n{:<4} {:<22} {:<10} {:<12} {:>10} {:>10}", "ID", "Model", "Plate", "State", "Distance", "Anomalies");
    for v in &vehicles {
        println!(
            "{:<4} {:<22} {:<10} {:<12} {:>10.1} {:>10}",
            v.vehicle_id,
            v.make_model,
            v.license_plate,
            v.state.as_str(),
            v.total_distance_km,
            v.total_anomalies,
        );
    }
    println!();
    Ok(())
}
