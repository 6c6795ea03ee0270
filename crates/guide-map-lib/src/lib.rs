//! Guide Map Library - Offline Map Tiles, Points of Interest and Walking Routes
//!
//! This library holds the data pipeline behind an offline city guide map: it
//! turns geographic coordinates into slippy-map tiles, resolves tile imagery
//! from bundled and cached files (never from the network), loads points of
//! interest and walking routes from delimited or XML data files, loads route
//! tracks from GPX and drives a map view controller that clamps the viewport,
//! filters points by category and emits render commands.
//!
//! # Architecture
//!
//! - **[`tile`]**: Web Mercator tile math ([`TileIndex`], [`TileRange`])
//! - **[`TileStore`]**: bundle → cache → empty tile resolution, plus the
//!   one-shot background [`TilePrefetcher`]
//! - **[`loader`]**: CSV and XML decoding into [`PointOfInterest`] and [`Route`]
//! - **[`Track`]**: GPX track points and bearing for the direction indicator
//! - **[`MapController`]**: viewport × category filter × selected route state
//! - **[`GuideSession`]**: explicit initialisation tying everything together
//!
//! # Failure policy
//!
//! Loading fails soft and logs loud: a bad record is skipped, a missing file
//! yields an empty collection, an undecodable file yields an empty collection.
//! The strict `parse_*` functions expose the underlying [`DataError`].

mod config;
mod controller;
mod filter;
pub mod loader;
mod overlay;
mod poi;
mod point;
mod prefetch;
mod route;
mod session;
pub mod tile;
mod tile_store;
mod track;
pub mod utils;
mod viewport;

use std::path::PathBuf;

// Public API exports
pub use config::Config;
pub use controller::MapController;
pub use filter::{CategoryFilter, FilterMode};
pub use loader::{DataFormat, DataSource, LoadOutcome, load_pois, load_routes};
pub use overlay::{CategoryStyle, MapLayer, RenderCommand};
pub use poi::{Categories, PointOfInterest, all_categories};
pub use point::{GeoPoint, compute_bearing, haversine_km};
pub use prefetch::{PrefetchHandle, PrefetchProgress, PrefetchReport, TilePrefetcher};
pub use route::Route;
pub use session::GuideSession;
pub use tile::{TileIndex, TileRange, point_to_tile, tiles_for_region};
pub use tile_store::{DirectoryAssets, Materialized, TileAssets, TileStore};
pub use track::{DirectoryTracks, DirectionIndicator, Track, TrackSource, parse_track};
pub use viewport::{Viewport, ViewportLimits};

/// Why a single record (CSV row, XML entry, track point) was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordIssue {
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("no categories")]
    NoCategories,

    #[error("'{0}' repeats an earlier point of interest at the same location")]
    DuplicatePoi(String),

    #[error("unreadable row: {0}")]
    Unreadable(String),
}

/// Error types for the data pipeline
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Malformed record #{index}: {issue}")]
    MalformedRecord { index: usize, issue: RecordIssue },

    #[error("Resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("Failed to decode {source_name}: {detail}")]
    Decode { source_name: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Invalid tile index {0}")]
    InvalidTile(TileIndex),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, DataError>;
