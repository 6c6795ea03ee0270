//! Slippy-map tile coordinate system and conversions
//! Uses the Web Mercator projection (EPSG:3857) compatible with OSM

use crate::utils::clamp_latitude;
use crate::{GeoPoint, Viewport};
use geo::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Deepest zoom level supported (tile indices must fit in `u32`)
pub const MAX_ZOOM: u8 = 30;

/// Deepest zoom level the map is shown or prefetched at
pub const MAX_DISPLAY_ZOOM: u8 = 19;

/// Unique identifier for a map tile
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileIndex {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at this zoom level
    #[inline]
    pub fn tiles_per_axis(&self) -> u64 {
        tiles_per_axis(self.zoom)
    }

    /// Whether x and y lie in [0, 2^zoom) and the zoom is supported
    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_ZOOM
            && u64::from(self.x) < self.tiles_per_axis()
            && u64::from(self.y) < self.tiles_per_axis()
    }

    /// File name used by the bundled asset set: `{zoom}-{x}-{y}.png`
    pub fn asset_name(&self) -> String {
        format!("{}-{}-{}.png", self.zoom, self.x, self.y)
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[inline]
fn tiles_per_axis(zoom: u8) -> u64 {
    1_u64 << zoom.min(MAX_ZOOM)
}

/// Convert a point to the tile containing it at the given zoom
///
/// Latitude is clamped to the Web Mercator range first so the projection
/// never hits the tan/cos singularities at the poles. The resulting indices
/// are clamped into `[0, 2^zoom)`.
pub fn point_to_tile(point: GeoPoint, zoom: u8) -> TileIndex {
    let zoom = zoom.min(MAX_ZOOM);
    let n = tiles_per_axis(zoom) as f64;
    let max_index = tiles_per_axis(zoom) - 1;

    // X coordinate (longitude)
    let x = ((point.lon + 180.0) / 360.0 * n).floor();

    // Y coordinate (latitude) - Mercator projection
    let lat_rad = clamp_latitude(point.lat).to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    TileIndex::new(zoom, clamp_index(x, max_index), clamp_index(y, max_index))
}

#[inline]
fn clamp_index(value: f64, max_index: u64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value as u64).min(max_index) as u32
    }
}

/// Convert fractional tile coordinates to a point
fn tile_coords_to_point(x: f64, y: f64, zoom: u8) -> GeoPoint {
    let n = tiles_per_axis(zoom) as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    GeoPoint::new(lat_rad.to_degrees(), lon)
}

/// Geographic centre of a tile
pub fn tile_center(index: TileIndex) -> GeoPoint {
    tile_coords_to_point(index.x as f64 + 0.5, index.y as f64 + 0.5, index.zoom)
}

/// Geographic bounds of a tile (x = longitude, y = latitude)
pub fn tile_bounds(index: TileIndex) -> Rect<f64> {
    let nw = tile_coords_to_point(index.x as f64, index.y as f64, index.zoom);
    let se = tile_coords_to_point(index.x as f64 + 1.0, index.y as f64 + 1.0, index.zoom);
    Rect::new(
        Coord { x: nw.lon, y: se.lat },
        Coord { x: se.lon, y: nw.lat },
    )
}

/// Integer zoom level whose single tile is at least as wide as `lon_span`
///
/// Clamped to `[min_zoom, max_zoom]`; non-positive spans map to `max_zoom`.
pub fn zoom_for_span(lon_span: f64, min_zoom: u8, max_zoom: u8) -> u8 {
    if !(lon_span > 0.0) {
        return max_zoom;
    }
    let zoom = (360.0 / lon_span).log2().floor();
    if zoom <= min_zoom as f64 {
        min_zoom
    } else if zoom >= max_zoom as f64 {
        max_zoom
    } else {
        zoom as u8
    }
}

/// Inclusive rectangle of tiles at one zoom level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Build the range spanned by two corner tiles (in any order)
    pub fn between(a: TileIndex, b: TileIndex) -> Self {
        debug_assert_eq!(a.zoom, b.zoom);
        Self {
            zoom: a.zoom,
            min_x: a.x.min(b.x),
            max_x: a.x.max(b.x),
            min_y: a.y.min(b.y),
            max_y: a.y.max(b.y),
        }
    }

    /// Number of tiles in the range
    pub fn len(&self) -> usize {
        let width = (self.max_x - self.min_x) as usize + 1;
        let height = (self.max_y - self.min_y) as usize + 1;
        width * height
    }

    /// A range always holds at least one tile
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, tile: &TileIndex) -> bool {
        tile.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&tile.x)
            && (self.min_y..=self.max_y).contains(&tile.y)
    }

    /// North-west and south-east corner tiles
    pub fn corners(&self) -> (TileIndex, TileIndex) {
        (
            TileIndex::new(self.zoom, self.min_x, self.min_y),
            TileIndex::new(self.zoom, self.max_x, self.max_y),
        )
    }

    /// Iterate tiles row by row (north to south, west to east)
    pub fn iter(&self) -> impl Iterator<Item = TileIndex> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| {
            (self.min_x..=self.max_x).map(move |x| TileIndex::new(self.zoom, x, y))
        })
    }
}

/// All tiles covering the viewport at the given zoom level
///
/// The north-west and south-east corners of the viewport are projected to
/// tiles and every tile between them (inclusive) is part of the result. No
/// antimeridian wraparound is performed.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn tiles_for_region(viewport: &Viewport, zoom: u8) -> TileRange {
    let (nw, se) = viewport.corners();
    TileRange::between(point_to_tile(nw, zoom), point_to_tile(se, zoom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_tile_known_values() {
        // Southampton at zoom 12
        let tile = point_to_tile(GeoPoint::new(50.9097, -1.4044), 12);
        assert_eq!(tile, TileIndex::new(12, 2032, 1372));

        // Origin at zoom 1 sits in the south-east quadrant
        assert_eq!(point_to_tile(GeoPoint::new(0.0, 0.0), 1), TileIndex::new(1, 1, 1));
        assert_eq!(point_to_tile(GeoPoint::new(10.0, 10.0), 0), TileIndex::new(0, 0, 0));
    }

    #[test]
    fn test_point_to_tile_stays_in_range() {
        for zoom in [0_u8, 1, 5, 12, 18] {
            let n = 1_u64 << zoom;
            for (lat, lon) in [
                (90.0, 180.0),
                (-90.0, -180.0),
                (89.9999, 179.9999),
                (-85.0, 0.0),
                (0.0, 180.0),
                (51.06, -1.31),
            ] {
                let tile = point_to_tile(GeoPoint::new(lat, lon), zoom);
                assert!((tile.x as u64) < n, "x out of range for {lat},{lon}@{zoom}");
                assert!((tile.y as u64) < n, "y out of range for {lat},{lon}@{zoom}");
                assert!(tile.is_valid());
            }
        }
    }

    #[test]
    fn test_tile_center_round_trip() {
        for zoom in [0_u8, 3, 10, 16] {
            for (lat, lon) in [(50.9097, -1.4044), (-33.86, 151.2), (0.0, 0.0), (70.0, -150.0)] {
                let tile = point_to_tile(GeoPoint::new(lat, lon), zoom);
                assert_eq!(point_to_tile(tile_center(tile), zoom), tile);
            }
        }
    }

    #[test]
    fn test_tile_bounds_contain_center() {
        let tile = TileIndex::new(14, 8130, 5490);
        let bounds = tile_bounds(tile);
        let center = tile_center(tile);
        assert!(bounds.min().x < center.lon && center.lon < bounds.max().x);
        assert!(bounds.min().y < center.lat && center.lat < bounds.max().y);
    }

    #[test]
    fn test_tiles_for_region_corners() {
        let viewport = Viewport::new(GeoPoint::new(50.9097, -1.4044), 0.05, 0.05);
        let range = tiles_for_region(&viewport, 14);
        let (nw, se) = viewport.corners();
        assert_eq!(range.corners(), (point_to_tile(nw, 14), point_to_tile(se, 14)));

        let tiles: Vec<TileIndex> = range.iter().collect();
        assert_eq!(tiles.len(), range.len());
        assert!(tiles.iter().all(|t| range.contains(t)));
        assert_eq!(tiles.first(), Some(&range.corners().0));
        assert_eq!(tiles.last(), Some(&range.corners().1));
    }

    #[test]
    fn test_tiles_for_collapsed_region() {
        let viewport = Viewport::new(GeoPoint::new(51.06, -1.31), 0.0, 0.0);
        let range = tiles_for_region(&viewport, 16);
        assert_eq!(range.len(), 1);
        assert_eq!(range.iter().count(), 1);
    }

    #[test]
    fn test_asset_name_and_validity() {
        let tile = TileIndex::new(12, 2032, 1372);
        assert_eq!(tile.asset_name(), "12-2032-1372.png");
        assert!(!TileIndex::new(2, 4, 0).is_valid());
        assert!(!TileIndex::new(31, 0, 0).is_valid());
    }

    #[test]
    fn test_zoom_for_span() {
        assert_eq!(zoom_for_span(360.0, 0, 19), 0);
        assert_eq!(zoom_for_span(0.05, 0, 19), 12);
        assert_eq!(zoom_for_span(0.05, 13, 19), 13);
        assert_eq!(zoom_for_span(0.000001, 0, 19), 19);
        assert_eq!(zoom_for_span(0.0, 0, 19), 19);
    }
}
