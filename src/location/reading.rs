use serde::{Deserialize, Serialize};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A single location fix as delivered by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Radius of uncertainty in meters, lower is better.
    pub accuracy: f32,
    /// Capture time in milliseconds since the Unix epoch.
    pub captured_at_ms: i64,
}

impl LocationReading {
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        accuracy: f32,
        captured_at_ms: i64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            accuracy,
            captured_at_ms,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.captured_at_ms
    }

    /// Exact coordinate equality; altitude and accuracy are ignored.
    pub fn same_position(&self, other: &LocationReading) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &LocationReading) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + (d_lon / 2.0).sin().powi(2)
                * self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos();
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }

    pub fn describe(&self, device_id: &str) -> String {
        format!(
            "lat={}&lng={}&alt={}&devId={}",
            self.latitude, self.longitude, self.altitude, device_id
        )
    }
}
