//! Explicit application context
//!
//! Everything a running guide needs is created by [`GuideSession::open`]
//! and owned by the returned value; nothing lives in process-wide state.

use crate::loader::{load_pois_file, load_routes_file};
use crate::{
    Config, DirectoryTracks, MapController, PrefetchHandle, Result, TilePrefetcher, TileStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Data, tile store and controller of one guide
#[derive(Debug)]
pub struct GuideSession {
    config: Config,
    store: Arc<TileStore>,
    controller: MapController,
}

/// `{dir}/{stem}.xml` when present, `{dir}/{stem}.csv` otherwise
fn data_file(dir: &Path, stem: &str) -> PathBuf {
    let xml = dir.join(format!("{stem}.xml"));
    if xml.is_file() {
        xml
    } else {
        dir.join(format!("{stem}.csv"))
    }
}

impl GuideSession {
    /// Validate the config, load POIs and routes and build the tile store
    ///
    /// Only an invalid config is an error. Missing or broken data files are
    /// logged and leave the corresponding collection empty.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let pois_path = data_file(&config.data_dir, "pois");
        let routes_path = data_file(&config.data_dir, "routes");
        let pois = load_pois_file(&pois_path);
        let routes = load_routes_file(&routes_path);
        tracing::info!(
            "Loaded {} point(s) of interest from {} and {} route(s) from {}",
            pois.len(),
            pois_path.display(),
            routes.len(),
            routes_path.display()
        );

        let tracks = Arc::new(DirectoryTracks::new(&config.data_dir));
        let store = Arc::new(TileStore::from_config(&config));
        let controller = MapController::new(pois, routes, tracks, &config);

        Ok(Self {
            config,
            store,
            controller,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<TileStore> {
        &self.store
    }

    pub fn controller(&self) -> &MapController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MapController {
        &mut self.controller
    }

    /// Start copying bundled tiles around the initial viewport into the cache
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_prefetch(&self) -> PrefetchHandle {
        TilePrefetcher::spawn(
            Arc::clone(&self.store),
            self.config.initial_viewport.clamped(&self.config.limits),
            self.config.prefetch_zooms(),
        )
    }
}
