//! Great-circle geometry and geofence containment.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers (WGS-84 sphere).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (lat, lon) points in degrees, in km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// A named circular region. Restricted fences emit anomalies on entry;
/// open fences exist for informational queries only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    pub restricted: bool,
}

impl Geofence {
    pub fn new(name: &str, center_lat: f64, center_lon: f64, radius_km: f64, restricted: bool) -> Self {
        Self {
            name: name.to_string(),
            center_lat,
            center_lon,
            radius_km,
            restricted,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        haversine_km(self.center_lat, self.center_lon, lat, lon) <= self.radius_km
    }
}
