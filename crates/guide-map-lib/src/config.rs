//! Session configuration

use crate::tile::MAX_DISPLAY_ZOOM;
use crate::{DataError, GeoPoint, Result, Viewport, ViewportLimits};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Configuration for a guide session
///
/// The defaults reproduce the Southampton city guide: a 0.05° window over
/// the city centre, bounded to the surrounding area, with tiles prefetched
/// for zoom levels 12 to 16.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Directory holding `pois.{xml,csv}`, `routes.{xml,csv}` and GPX tracks
    pub data_dir: PathBuf,
    /// Bundled tile assets named `{zoom}-{x}-{y}.png`
    pub tiles_dir: PathBuf,
    /// Writable tile cache laid out as `{zoom}/{x}/{y}.png`
    pub cache_dir: PathBuf,
    /// Viewport shown when the session opens
    pub initial_viewport: Viewport,
    /// Allowed region and span range
    pub limits: ViewportLimits,
    /// Span (degrees) used when recentring on a single POI
    pub focus_span: f64,
    /// Lowest zoom level prefetched into the cache
    pub prefetch_min_zoom: u8,
    /// Highest zoom level prefetched into the cache
    pub prefetch_max_zoom: u8,
    /// Number of tile images kept in memory
    pub tile_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tiles_dir: PathBuf::from("data/tiles"),
            cache_dir: PathBuf::from("cache/tiles"),
            initial_viewport: Viewport::new(GeoPoint::new(50.9097, -1.4044), 0.05, 0.05),
            limits: ViewportLimits::new(
                GeoPoint::new(50.85, -1.50),
                GeoPoint::new(50.97, -1.30),
                0.002,
                0.1,
            ),
            focus_span: 0.01,
            prefetch_min_zoom: 12,
            prefetch_max_zoom: 16,
            tile_cache_capacity: 256,
        }
    }
}

impl Config {
    pub fn prefetch_zooms(&self) -> RangeInclusive<u8> {
        self.prefetch_min_zoom..=self.prefetch_max_zoom
    }

    /// Reject configurations the session cannot work with
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;

        let center = self.initial_viewport.center;
        if !(center.lat.is_finite() && center.lon.is_finite()) {
            return Err(DataError::InvalidConfig(format!(
                "initial viewport centre {center} is not finite"
            )));
        }
        if !(self.focus_span > 0.0 && self.focus_span.is_finite()) {
            return Err(DataError::InvalidConfig(format!(
                "focus span must be positive, got {}",
                self.focus_span
            )));
        }
        if self.prefetch_min_zoom > self.prefetch_max_zoom {
            return Err(DataError::InvalidConfig(format!(
                "prefetch zoom range {}..={} is inverted",
                self.prefetch_min_zoom, self.prefetch_max_zoom
            )));
        }
        if self.prefetch_max_zoom > MAX_DISPLAY_ZOOM {
            return Err(DataError::InvalidConfig(format!(
                "prefetch zoom {} exceeds the display maximum of {MAX_DISPLAY_ZOOM}",
                self.prefetch_max_zoom
            )));
        }
        if self.tile_cache_capacity == 0 {
            return Err(DataError::InvalidConfig(
                "tile cache capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prefetch_zooms(), 12..=16);
        assert!(config.initial_viewport.is_within(&config.limits));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.prefetch_min_zoom = 17;
        assert!(matches!(config.validate(), Err(DataError::InvalidConfig(_))));

        let mut config = Config::default();
        config.prefetch_max_zoom = 20;
        assert!(config.validate().is_err());
        config.prefetch_max_zoom = 19;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.focus_span = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_span = 0.001;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tile_cache_capacity = 0;
        assert!(config.validate().is_err());
    }
}
