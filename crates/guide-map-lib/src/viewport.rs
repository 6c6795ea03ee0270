//! Viewport state and clamping against the allowed map region

use crate::{DataError, GeoPoint, Result};
use geo::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The geographic window currently shown by the map
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    /// Centre of the window
    pub center: GeoPoint,
    /// Height of the window in degrees of latitude
    pub lat_span: f64,
    /// Width of the window in degrees of longitude
    pub lon_span: f64,
}

impl Viewport {
    pub const fn new(center: GeoPoint, lat_span: f64, lon_span: f64) -> Self {
        Self {
            center,
            lat_span,
            lon_span,
        }
    }

    /// North-west and south-east corners
    pub fn corners(&self) -> (GeoPoint, GeoPoint) {
        let half_lat = self.lat_span / 2.0;
        let half_lon = self.lon_span / 2.0;
        (
            GeoPoint::new(self.center.lat + half_lat, self.center.lon - half_lon),
            GeoPoint::new(self.center.lat - half_lat, self.center.lon + half_lon),
        )
    }

    /// Bounding rectangle (x = longitude, y = latitude)
    pub fn bounds(&self) -> Rect<f64> {
        let (nw, se) = self.corners();
        Rect::new(
            Coord { x: nw.lon, y: se.lat },
            Coord { x: se.lon, y: nw.lat },
        )
    }

    /// Whether the point lies inside the window (edges included)
    pub fn contains(&self, point: GeoPoint) -> bool {
        let (nw, se) = self.corners();
        (se.lat..=nw.lat).contains(&point.lat) && (nw.lon..=se.lon).contains(&point.lon)
    }

    /// Clamp spans into `[min_span, max_span]`, then move the centre so the
    /// edges stay inside the allowed bounds
    ///
    /// When a span is wider than the bounds themselves the centre is pinned to
    /// the middle of the bounds on that axis.
    pub fn clamped(&self, limits: &ViewportLimits) -> Viewport {
        let lat_span = clamp_span(self.lat_span, limits);
        let lon_span = clamp_span(self.lon_span, limits);

        let min = limits.bounds.min();
        let max = limits.bounds.max();
        let lat = clamp_axis(self.center.lat, lat_span, min.y, max.y);
        let lon = clamp_axis(self.center.lon, lon_span, min.x, max.x);

        Viewport::new(GeoPoint::new(lat, lon), lat_span, lon_span)
    }

    /// Whether clamping would leave this viewport unchanged
    pub fn is_within(&self, limits: &ViewportLimits) -> bool {
        self.clamped(limits) == *self
    }
}

fn clamp_span(span: f64, limits: &ViewportLimits) -> f64 {
    if span.is_nan() {
        return limits.max_span;
    }
    span.clamp(limits.min_span, limits.max_span)
}

fn clamp_axis(center: f64, span: f64, min: f64, max: f64) -> f64 {
    let half = span / 2.0;
    let lo = min + half;
    let hi = max - half;
    if lo > hi || center.is_nan() {
        (min + max) / 2.0
    } else {
        center.clamp(lo, hi)
    }
}

/// Allowed region and zoom range for the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewportLimits {
    /// Geographic bounding box the viewport edges must stay in
    /// (x = longitude, y = latitude)
    pub bounds: Rect<f64>,
    /// Smallest span in degrees (deepest zoom)
    pub min_span: f64,
    /// Largest span in degrees (widest zoom)
    pub max_span: f64,
}

impl ViewportLimits {
    /// Create limits from south-west / north-east corners
    pub fn new(south_west: GeoPoint, north_east: GeoPoint, min_span: f64, max_span: f64) -> Self {
        Self {
            bounds: Rect::new(
                Coord {
                    x: south_west.lon,
                    y: south_west.lat,
                },
                Coord {
                    x: north_east.lon,
                    y: north_east.lat,
                },
            ),
            min_span,
            max_span,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_corners(self.bounds.min(), self.bounds.max()).map_err(DataError::InvalidConfig)?;
        if !(self.min_span > 0.0) || !self.max_span.is_finite() {
            return Err(DataError::InvalidConfig(format!(
                "spans must be positive and finite (min {}, max {})",
                self.min_span, self.max_span
            )));
        }
        if self.min_span > self.max_span {
            return Err(DataError::InvalidConfig(format!(
                "min_span {} is larger than max_span {}",
                self.min_span, self.max_span
            )));
        }
        Ok(())
    }
}

/// `Rect::new` orders its corners but a deserialized `Rect` keeps them as
/// written, so the order is checked here too
fn check_corners(min: Coord<f64>, max: Coord<f64>) -> std::result::Result<(), String> {
    if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
        return Err("bounds must be finite".to_string());
    }
    if !(-90.0..=90.0).contains(&min.y) || !(-90.0..=90.0).contains(&max.y) {
        return Err("bounds latitude outside [-90, 90]".to_string());
    }
    if !(-180.0..=180.0).contains(&min.x) || !(-180.0..=180.0).contains(&max.x) {
        return Err("bounds longitude outside [-180, 180]".to_string());
    }
    if min.x > max.x || min.y > max.y {
        return Err(format!(
            "bounds are inverted: min ({}, {}) lies beyond max ({}, {})",
            min.y, min.x, max.y, max.x
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ViewportLimits {
        ViewportLimits::new(
            GeoPoint::new(50.80, -1.60),
            GeoPoint::new(51.00, -1.20),
            0.002,
            0.1,
        )
    }

    #[test]
    fn test_inverted_corners_rejected() {
        let sw = Coord { x: -1.5, y: 50.85 };
        let ne = Coord { x: -1.3, y: 50.97 };
        assert!(check_corners(sw, ne).is_ok());
        assert!(check_corners(ne, sw).is_err());
        assert!(check_corners(Coord { x: -1.3, y: 50.85 }, Coord { x: -1.5, y: 50.97 }).is_err());
        assert!(limits().validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_inverted_bounds_from_json() {
        let json = r#"{
            "bounds": { "min": { "x": -1.3, "y": 50.97 }, "max": { "x": -1.5, "y": 50.85 } },
            "min_span": 0.002,
            "max_span": 0.1
        }"#;
        let limits: ViewportLimits = serde_json::from_str(json).unwrap();
        assert!(matches!(limits.validate(), Err(DataError::InvalidConfig(_))));
    }

    #[test]
    fn test_corners() {
        let vp = Viewport::new(GeoPoint::new(50.0, 1.0), 0.2, 0.4);
        let (nw, se) = vp.corners();
        assert!((nw.lat - 50.1).abs() < 1e-12 && (nw.lon - 0.8).abs() < 1e-12);
        assert!((se.lat - 49.9).abs() < 1e-12 && (se.lon - 1.2).abs() < 1e-12);
        assert!(vp.contains(GeoPoint::new(50.05, 1.1)));
        assert!(!vp.contains(GeoPoint::new(50.2, 1.0)));
    }

    #[test]
    fn test_clamp_is_idempotent_inside_bounds() {
        let vp = Viewport::new(GeoPoint::new(50.9, -1.4), 0.05, 0.05);
        assert_eq!(vp.clamped(&limits()), vp);
        assert!(vp.is_within(&limits()));
    }

    #[test]
    fn test_center_outside_bounds_is_pulled_in() {
        let vp = Viewport::new(GeoPoint::new(52.0, -3.0), 0.05, 0.05);
        let clamped = vp.clamped(&limits());
        assert_eq!(clamped.lat_span, 0.05);
        assert_eq!(clamped.lon_span, 0.05);
        // Nearest in-bounds centre keeps the north-west edge on the boundary
        assert!((clamped.center.lat - 50.975).abs() < 1e-9);
        assert!((clamped.center.lon - -1.575).abs() < 1e-9);
        assert!(clamped.is_within(&limits()));
    }

    #[test]
    fn test_span_is_clamped() {
        let wide = Viewport::new(GeoPoint::new(50.9, -1.4), 5.0, 5.0).clamped(&limits());
        assert_eq!(wide.lat_span, 0.1);
        assert_eq!(wide.lon_span, 0.1);

        let narrow = Viewport::new(GeoPoint::new(50.9, -1.4), 0.0, 0.0001).clamped(&limits());
        assert_eq!(narrow.lat_span, 0.002);
        assert_eq!(narrow.lon_span, 0.002);
    }

    #[test]
    fn test_span_wider_than_bounds_pins_center() {
        let limits = ViewportLimits::new(
            GeoPoint::new(50.90, -1.42),
            GeoPoint::new(50.92, -1.38),
            0.001,
            0.1,
        );
        let vp = Viewport::new(GeoPoint::new(50.0, 0.0), 0.05, 0.05).clamped(&limits);
        assert!((vp.center.lat - 50.91).abs() < 1e-9);
        assert!((vp.center.lon - -1.40).abs() < 1e-9);
    }

    #[test]
    fn test_validate_limits() {
        assert!(limits().validate().is_ok());

        let mut bad = limits();
        bad.min_span = 0.5;
        assert!(matches!(bad.validate(), Err(DataError::InvalidConfig(_))));

        let mut bad = limits();
        bad.min_span = 0.0;
        assert!(bad.validate().is_err());
    }
}
