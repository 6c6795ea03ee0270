//! Map view controller
//!
//! Owns the viewport, the category filter and the selected route. Every
//! operation updates that state and returns the [`RenderCommand`]s the
//! drawing surface needs to catch up. Loaded POIs and routes are shared
//! read-only.

use crate::tile::{MAX_DISPLAY_ZOOM, TileRange, tiles_for_region, zoom_for_span};
use crate::{
    CategoryFilter, Config, DataError, GeoPoint, MapLayer, PointOfInterest, RenderCommand, Result,
    Route, TrackSource, Viewport, ViewportLimits, all_categories,
};
use std::sync::Arc;

/// Shallowest zoom level the drawing surface can show
const MIN_DISPLAY_ZOOM: u8 = 0;

#[derive(Debug, Clone)]
struct SelectedRoute {
    index: usize,
    overlay: Vec<MapLayer>,
}

pub struct MapController {
    pois: Arc<[PointOfInterest]>,
    routes: Arc<[Route]>,
    tracks: Arc<dyn TrackSource>,
    limits: ViewportLimits,
    focus_span: f64,
    viewport: Viewport,
    filter: CategoryFilter,
    selected: Option<SelectedRoute>,
}

impl std::fmt::Debug for MapController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapController")
            .field("pois", &self.pois.len())
            .field("routes", &self.routes.len())
            .field("viewport", &self.viewport)
            .field("filter", &self.filter)
            .field("selected", &self.selected_route().map(|r| &r.name))
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MapController {
    /// Controller showing the configured initial viewport with every loaded
    /// category selected
    pub fn new(
        pois: impl Into<Arc<[PointOfInterest]>>,
        routes: impl Into<Arc<[Route]>>,
        tracks: Arc<dyn TrackSource>,
        config: &Config,
    ) -> Self {
        let pois = pois.into();
        let filter = CategoryFilter::with_selected(all_categories(&pois));
        Self {
            viewport: config.initial_viewport.clamped(&config.limits),
            pois,
            routes: routes.into(),
            tracks,
            limits: config.limits,
            focus_span: config.focus_span,
            filter,
            selected: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn pois(&self) -> &[PointOfInterest] {
        &self.pois
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn selected_route(&self) -> Option<&Route> {
        self.selected.as_ref().map(|s| &self.routes[s.index])
    }

    /// Zoom level matching the current viewport width
    pub fn tile_zoom(&self) -> u8 {
        zoom_for_span(self.viewport.lon_span, MIN_DISPLAY_ZOOM, MAX_DISPLAY_ZOOM)
    }

    /// Tiles covering the current viewport
    pub fn visible_tiles(&self) -> TileRange {
        tiles_for_region(&self.viewport, self.tile_zoom())
    }

    /// POIs passing the category filter, in load order
    pub fn visible_pois(&self) -> Vec<&PointOfInterest> {
        self.filter.apply(&self.pois).collect()
    }

    /// Commands drawing the whole current state from scratch
    pub fn initial_commands(&self) -> Vec<RenderCommand> {
        let mut commands = self.viewport_commands();
        commands.push(self.poi_markers());
        if let Some(selected) = &self.selected {
            commands.push(RenderCommand::ReplaceRouteOverlay(selected.overlay.clone()));
        }
        commands
    }

    /// Full layer list, bottom to top: tiles, route overlay, POI markers
    pub fn layers(&self) -> Vec<MapLayer> {
        let mut layers = vec![MapLayer::TileLayer {
            tiles: self.visible_tiles(),
        }];
        if let Some(selected) = &self.selected {
            layers.extend(selected.overlay.iter().cloned());
        }
        layers.extend(self.visible_pois().into_iter().map(MapLayer::poi_marker));
        layers
    }

    fn viewport_commands(&self) -> Vec<RenderCommand> {
        vec![
            RenderCommand::SetViewport(self.viewport),
            RenderCommand::RequestTiles(self.visible_tiles()),
        ]
    }

    fn poi_markers(&self) -> RenderCommand {
        RenderCommand::ReplacePoiMarkers(
            self.visible_pois()
                .into_iter()
                .map(MapLayer::poi_marker)
                .collect(),
        )
    }

    /// Clamp a proposed viewport into the allowed region and adopt it
    pub fn propose_viewport(&mut self, proposed: Viewport) -> Vec<RenderCommand> {
        let clamped = proposed.clamped(&self.limits);
        if clamped != proposed {
            tracing::trace!("Viewport clamped from {:?} to {:?}", proposed, clamped);
        }
        self.viewport = clamped;
        self.viewport_commands()
    }

    /// Move the centre by the given offsets in degrees
    pub fn pan_by(&mut self, delta_lat: f64, delta_lon: f64) -> Vec<RenderCommand> {
        let center = self.viewport.center;
        self.propose_viewport(Viewport {
            center: GeoPoint::new(center.lat + delta_lat, center.lon + delta_lon),
            ..self.viewport
        })
    }

    /// Scale both spans; a factor above 1 zooms out
    pub fn zoom_by(&mut self, factor: f64) -> Vec<RenderCommand> {
        if !(factor > 0.0 && factor.is_finite()) {
            tracing::warn!("Ignoring zoom factor {factor}");
            return Vec::new();
        }
        self.propose_viewport(Viewport {
            lat_span: self.viewport.lat_span * factor,
            lon_span: self.viewport.lon_span * factor,
            ..self.viewport
        })
    }

    /// Recentre on a POI using the focus span
    pub fn focus_on_poi(&mut self, poi: &PointOfInterest) -> Vec<RenderCommand> {
        self.propose_viewport(Viewport::new(poi.location, self.focus_span, self.focus_span))
    }

    pub fn toggle_category(&mut self, category: &str) -> Vec<RenderCommand> {
        self.filter.toggle(category);
        vec![self.poi_markers()]
    }

    pub fn clear_categories(&mut self) -> Vec<RenderCommand> {
        self.filter.clear();
        vec![self.poi_markers()]
    }

    pub fn select_all_categories(&mut self) -> Vec<RenderCommand> {
        self.filter.select_all();
        vec![self.poi_markers()]
    }

    /// Replace the whole filter
    pub fn set_filter(&mut self, filter: CategoryFilter) -> Vec<RenderCommand> {
        self.filter = filter;
        vec![self.poi_markers()]
    }

    /// Select a route by name; unknown names are logged and ignored
    pub fn select_route(&mut self, name: &str) -> Vec<RenderCommand> {
        match self.try_select_route(name) {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!("{e}");
                Vec::new()
            }
        }
    }

    /// Select a route by name, loading its track afresh
    ///
    /// The new overlay replaces any previous one. A track that fails to load
    /// yields an empty overlay.
    pub fn try_select_route(&mut self, name: &str) -> Result<Vec<RenderCommand>> {
        let index = self
            .routes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| DataError::UnknownRoute(name.to_string()))?;
        let route = &self.routes[index];
        let track = self.tracks.load_track(&route.track_ref);

        let mut overlay = Vec::with_capacity(3);
        if let Some(start) = track.points.first() {
            overlay.push(MapLayer::RoutePolyline {
                route: route.name.clone(),
                points: track.points.clone(),
            });
            overlay.push(MapLayer::RouteMarker {
                route: route.name.clone(),
                at: *start,
            });
        }
        match track.start_indicator() {
            Some(indicator) => overlay.push(MapLayer::DirectionalIndicator {
                route: route.name.clone(),
                indicator,
            }),
            None => tracing::debug!(
                route = %route.name,
                "Track has fewer than two points, no direction indicator"
            ),
        }

        tracing::info!(route = %route.name, "Selected route ({} track point(s))", track.points.len());
        self.selected = Some(SelectedRoute {
            index,
            overlay: overlay.clone(),
        });
        Ok(vec![RenderCommand::ReplaceRouteOverlay(overlay)])
    }

    /// Remove the route overlay; tiles and POI markers stay as they are
    pub fn deselect_route(&mut self) -> Vec<RenderCommand> {
        match self.selected.take() {
            Some(_) => vec![RenderCommand::ClearRouteOverlay],
            None => Vec::new(),
        }
    }

    /// Resolve an annotation back to its POI by title and exact location
    pub fn find_poi(&self, title: &str, location: GeoPoint) -> Option<&PointOfInterest> {
        self.pois.iter().find(|p| p.is_identified_by(title, location))
    }

    /// Handle a tap on a POI marker
    pub fn tap_annotation(&self, title: &str, location: GeoPoint) -> Vec<RenderCommand> {
        match self.find_poi(title, location) {
            Some(poi) => vec![RenderCommand::ShowPoiDetail(poi.clone())],
            None => {
                tracing::debug!("Tap on unknown annotation '{title}' at {location}");
                Vec::new()
            }
        }
    }
}
