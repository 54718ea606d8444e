//! Startup seed data: the fixed fleet roster and the default geofence
//! table. Profiles live for the process lifetime; everything else in the
//! store is created lazily as samples arrive.

use crate::config::EngineConfig;
use crate::store::VehicleProfile;
use crate::telemetry::Geofence;

const FLEET_ROSTER: &[(&str, &str)] = &[
    ("Honda Civic", "ABC-123"),
    ("Toyota Camry", "DEF-456"),
    ("Ford F-150", "GHI-789"),
    ("BMW X3", "JKL-012"),
    ("Tesla Model 3", "MNO-345"),
    ("Chevrolet Silverado", "PQR-678"),
    ("Nissan Altima", "STU-901"),
    ("Hyundai Elantra", "VWX-234"),
    ("Mercedes C-Class", "YZA-567"),
    ("Audi A4", "BCD-890"),
    ("Volkswagen Jetta", "EFG-123"),
    ("Subaru Outback", "HIJ-456"),
    ("Mazda CX-5", "KLM-789"),
    ("Jeep Wrangler", "NOP-012"),
    ("Kia Sorento", "QRS-345"),
    ("Volvo XC90", "TUV-678"),
    ("Lexus RX", "WXY-901"),
    ("Acura MDX", "ZAB-234"),
    ("Infiniti Q50", "CDE-567"),
    ("Cadillac Escalade", "FGH-890"),
];

/// Profiles for the fixed 20-vehicle fleet, ids 1..=20.
pub fn seed_profiles(config: &EngineConfig) -> Vec<VehicleProfile> {
    FLEET_ROSTER
        .iter()
        .enumerate()
        .map(|(i, (model, plate))| {
            VehicleProfile::new(i as u32 + 1, model, plate, config.maintenance_interval_km)
        })
        .collect()
}

/// Default geofence table: two restricted zones, two informational.
pub fn seed_geofences() -> Vec<Geofence> {
    vec![
        Geofence::new("Downtown Area", 40.7128, -74.0060, 5.0, false),
        Geofence::new("Industrial Zone", 40.6892, -74.0445, 3.0, true),
        Geofence::new("School Zone", 40.7589, -73.9851, 1.0, true),
        Geofence::new("Highway Rest Area", 40.7505, -73.9934, 2.0, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_has_twenty_vehicles() {
        let profiles = seed_profiles(&EngineConfig::default());
        assert_eq!(profiles.len(), 20);
        assert_eq!(profiles[0].vehicle_id, 1);
        assert_eq!(profiles[19].vehicle_id, 20);
        assert_eq!(profiles[2].make_model, "Ford F-150");
    }

    #[test]
    fn test_restricted_fences() {
        let fences = seed_geofences();
        assert_eq!(fences.len(), 4);
        let restricted: Vec<&str> = fences
            .iter()
            .filter(|f| f.restricted)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(restricted, ["Industrial Zone", "School Zone"]);
    }
}
