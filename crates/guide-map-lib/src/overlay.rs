//! Map layers and the render commands sent to the drawing surface
//!
//! The drawing surface is an external collaborator. It receives
//! [`RenderCommand`]s and dispatches on [`MapLayer`] variants with an
//! exhaustive `match`, so adding a layer kind is a compile error everywhere
//! it is not handled.

use crate::tile::TileRange;
use crate::{DirectionIndicator, GeoPoint, PointOfInterest, Viewport};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Marker style derived from a POI's primary category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CategoryStyle {
    Museum,
    Park,
    Historic,
    Shopping,
    Restaurant,
    Entertainment,
    Transport,
    Education,
    Sports,
    Default,
}

impl CategoryStyle {
    /// Style for a category name (case-insensitive, unknown names get `Default`)
    pub fn for_category(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "museum" => Self::Museum,
            "park" => Self::Park,
            "historic" => Self::Historic,
            "shopping" => Self::Shopping,
            "restaurant" => Self::Restaurant,
            "entertainment" => Self::Entertainment,
            "transport" => Self::Transport,
            "education" => Self::Education,
            "sports" => Self::Sports,
            _ => Self::Default,
        }
    }

    /// Marker colour as RGB
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Self::Museum => [128, 0, 128],
            Self::Park => [0, 128, 0],
            Self::Historic => [165, 42, 42],
            Self::Shopping => [0, 0, 255],
            Self::Restaurant => [255, 0, 0],
            Self::Entertainment => [255, 165, 0],
            Self::Transport => [128, 128, 128],
            Self::Education => [75, 0, 130],
            Self::Sports => [0, 128, 128],
            Self::Default => [255, 192, 203],
        }
    }

    /// Marker colour as `#rrggbb`
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// One drawable element on the map
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "layer"))]
pub enum MapLayer {
    /// Base imagery for a block of tiles
    TileLayer { tiles: TileRange },
    /// Path of the selected route
    RoutePolyline { route: String, points: Vec<GeoPoint> },
    /// Start of the selected route
    RouteMarker { route: String, at: GeoPoint },
    /// Arrow showing the walking direction near the start
    DirectionalIndicator {
        route: String,
        indicator: DirectionIndicator,
    },
    PoiMarker {
        title: String,
        location: GeoPoint,
        style: CategoryStyle,
    },
}

impl MapLayer {
    pub fn poi_marker(poi: &PointOfInterest) -> Self {
        MapLayer::PoiMarker {
            title: poi.title.clone(),
            location: poi.location,
            style: CategoryStyle::for_category(poi.primary_category()),
        }
    }

    /// Whether the layer belongs to the selected route overlay
    pub fn is_route_overlay(&self) -> bool {
        match self {
            MapLayer::RoutePolyline { .. }
            | MapLayer::RouteMarker { .. }
            | MapLayer::DirectionalIndicator { .. } => true,
            MapLayer::TileLayer { .. } | MapLayer::PoiMarker { .. } => false,
        }
    }
}

/// Instruction for the drawing surface
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RenderCommand {
    /// Move the map to this (already clamped) viewport
    SetViewport(Viewport),
    /// Replace every POI marker with these layers
    ReplacePoiMarkers(Vec<MapLayer>),
    /// Replace the route overlay with these layers
    ReplaceRouteOverlay(Vec<MapLayer>),
    /// Remove the route overlay, keeping tiles and POI markers
    ClearRouteOverlay,
    /// Draw the tiles in this range
    RequestTiles(TileRange),
    /// Open the detail view for a tapped POI
    ShowPoiDetail(PointOfInterest),
}
