//! Walking route records
//!
//! A `Route` only describes the walk; the track geometry lives in a separate
//! GPX file named by `track_ref` and is loaded when the route is selected.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A walking route listed in the route data file
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    /// Display name (non-empty, used to select the route)
    pub name: String,
    pub description: String,
    /// Track file reference resolved by a [`crate::TrackSource`]
    pub track_ref: String,
    /// Advertised length in kilometres (>= 0)
    pub distance_km: f64,
    /// Free-form duration label, e.g. "45 min"
    pub duration_label: String,
}

impl Route {
    /// Human readable distance, e.g. "850 m" or "2.40 km"
    pub fn format_distance(&self) -> String {
        if self.distance_km < 1.0 {
            format!("{:.0} m", self.distance_km * 1000.0)
        } else {
            format!("{:.2} km", self.distance_km)
        }
    }
}
