use crate::model::Coordinates;

/// Mean earth radius (IUGG), meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters (haversine).
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
    pub distance_m: f64,
    pub radius_m: i32,
}

impl GeofenceCheck {
    pub fn evaluate(position: Coordinates, post: Coordinates, radius_m: i32) -> Self {
        Self {
            distance_m: distance_meters(position, post),
            radius_m,
        }
    }

    pub fn is_violation(&self) -> bool {
        self.distance_m > f64::from(self.radius_m)
    }
}
