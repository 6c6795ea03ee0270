//! Offline tile imagery: bundled assets, then the disk cache, then nothing
//!
//! No network access happens here. A tile that is neither bundled nor cached
//! resolves to empty bytes, which the drawing surface shows as "no imagery".

use crate::tile::TileIndex;
use crate::{Config, DataError, Result};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Read-only set of bundled tile images, addressed by
/// [`TileIndex::asset_name`]
pub trait TileAssets: Send + Sync {
    fn read(&self, name: &str) -> Option<Vec<u8>>;

    fn contains(&self, name: &str) -> bool {
        self.read(name).is_some()
    }
}

/// Bundled tiles stored as flat files in one directory
#[derive(Clone, Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileAssets for DirectoryAssets {
    fn read(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.root.join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Cannot read bundled tile {}: {e}", path.display());
                None
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// In-memory asset set, keyed by asset name
impl TileAssets for HashMap<String, Vec<u8>> {
    fn read(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Result of copying one tile into the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Materialized {
    /// The cache already held the tile
    AlreadyCached,
    /// The bundled tile was written to the cache
    Copied,
    /// The tile is not bundled, nothing to copy
    Missing,
}

/// Resolves tile indices to image bytes
///
/// Hits are kept in a bounded in-memory LRU. Misses are not remembered so a
/// tile cached later (for instance by the prefetcher) is picked up on the
/// next request.
pub struct TileStore {
    assets: Arc<dyn TileAssets>,
    cache_dir: PathBuf,
    memory: Mutex<LruCache<TileIndex, Arc<Vec<u8>>>>,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TileStore {
    pub fn new(assets: impl TileAssets + 'static, cache_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            assets: Arc::new(assets),
            cache_dir: cache_dir.into(),
            memory: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Store over the bundle and cache directories named in the config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DirectoryAssets::new(&config.tiles_dir),
            &config.cache_dir,
            config.tile_cache_capacity,
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/{zoom}/{x}/{y}.png`
    pub fn cache_path(&self, index: TileIndex) -> PathBuf {
        self.cache_dir
            .join(index.zoom.to_string())
            .join(index.x.to_string())
            .join(format!("{}.png", index.y))
    }

    /// Image bytes for a tile, empty when no imagery exists
    pub fn load_tile(&self, index: TileIndex) -> Arc<Vec<u8>> {
        if let Some(bytes) = self.lock_memory().get(&index) {
            return Arc::clone(bytes);
        }

        match self.read_tile(index) {
            Ok(bytes) => {
                let bytes = Arc::new(bytes);
                self.lock_memory().put(index, Arc::clone(&bytes));
                bytes
            }
            Err(e) => {
                tracing::debug!("No imagery for tile {index}: {e}");
                Arc::new(Vec::new())
            }
        }
    }

    /// Strict lookup: bundle first, then cache
    pub fn read_tile(&self, index: TileIndex) -> Result<Vec<u8>> {
        if !index.is_valid() {
            return Err(DataError::InvalidTile(index));
        }
        if let Some(bytes) = self.assets.read(&index.asset_name()) {
            return Ok(bytes);
        }
        let path = self.cache_path(index);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DataError::ResourceNotFound(path),
            _ => DataError::Io(e),
        })
    }

    /// Whether `load_tile` would return imagery, without reading it
    pub fn has_imagery(&self, index: TileIndex) -> bool {
        index.is_valid()
            && (self.lock_memory().contains(&index)
                || self.assets.contains(&index.asset_name())
                || self.cache_path(index).is_file())
    }

    /// Copy a bundled tile into the cache directory
    ///
    /// The bytes go to a temporary file first and are renamed into place, so
    /// a concurrent reader never sees a partially written tile.
    pub fn materialize(&self, index: TileIndex) -> Result<Materialized> {
        if !index.is_valid() {
            return Err(DataError::InvalidTile(index));
        }
        let path = self.cache_path(index);
        if path.is_file() {
            return Ok(Materialized::AlreadyCached);
        }
        let Some(bytes) = self.assets.read(&index.asset_name()) else {
            return Ok(Materialized::Missing);
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("png.{}.tmp", std::process::id()));
        std::fs::write(&tmp, &bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            std::fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(Materialized::Copied)
    }

    /// Drop every tile held in memory
    pub fn clear_memory(&self) {
        self.lock_memory().clear();
    }

    fn lock_memory(&self) -> std::sync::MutexGuard<'_, LruCache<TileIndex, Arc<Vec<u8>>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
