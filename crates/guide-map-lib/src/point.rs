//! Geographic points, great-circle distance and bearing

use crate::utils::EARTH_RADIUS_KM;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,
    /// Longitude in degrees, [-180, 180]
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Exact coordinate equality, used for POI identity
    #[inline]
    pub fn same_location(&self, other: &GeoPoint) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.lon, p.lat)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Forward azimuth from `a` to `b` in degrees, [0, 360), clockwise from north
pub fn compute_bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    let theta = y.atan2(x);

    let bearing = (theta.to_degrees() + 360.0) % 360.0;
    // -0.0 and values that round up to exactly 360.0
    if bearing >= 360.0 || bearing == 0.0 { 0.0 } else { bearing }
}

/// Haversine distance between two points in kilometres
#[inline]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
