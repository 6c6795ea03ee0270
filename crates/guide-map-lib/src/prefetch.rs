//! One-shot background copy of bundled tiles into the cache
//!
//! The prefetch covers the initial viewport over a range of zoom levels. It
//! runs as a single blocking task, reports progress through a `watch`
//! channel and can be cancelled. Per-tile failures are logged and counted,
//! they never stop the job.

use crate::tile::tiles_for_region;
use crate::{DataError, Materialized, Result, TileStore, Viewport};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of a running prefetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrefetchProgress {
    /// Tiles covered by the job across all zoom levels
    pub total: usize,
    /// Tiles handled so far, whatever the outcome
    pub processed: usize,
    /// Zoom level being worked on
    pub zoom: Option<u8>,
    pub finished: bool,
}

/// Final tally of a prefetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrefetchReport {
    pub copied: usize,
    pub already_cached: usize,
    /// Tiles with no bundled imagery
    pub missing: usize,
    pub failed: usize,
    /// Whether the job stopped early on request
    pub cancelled: bool,
}

impl PrefetchReport {
    fn merge(self, other: Self) -> Self {
        Self {
            copied: self.copied + other.copied,
            already_cached: self.already_cached + other.already_cached,
            missing: self.missing + other.missing,
            failed: self.failed + other.failed,
            cancelled: self.cancelled || other.cancelled,
        }
    }

    /// Tiles that were looked at
    pub fn processed(&self) -> usize {
        self.copied + self.already_cached + self.missing + self.failed
    }
}

/// Tiles to copy: the tiles covering `viewport` at every zoom in `zooms`
#[derive(Debug, Clone)]
pub struct TilePrefetcher {
    store: Arc<TileStore>,
    viewport: Viewport,
    zooms: RangeInclusive<u8>,
}

impl TilePrefetcher {
    pub fn new(store: Arc<TileStore>, viewport: Viewport, zooms: RangeInclusive<u8>) -> Self {
        Self {
            store,
            viewport,
            zooms,
        }
    }

    /// Start the prefetch on the blocking pool of the current tokio runtime
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn spawn(store: Arc<TileStore>, viewport: Viewport, zooms: RangeInclusive<u8>) -> PrefetchHandle {
        Self::new(store, viewport, zooms).start()
    }

    /// Consume the prefetcher and start it on the blocking pool
    pub fn start(self) -> PrefetchHandle {
        let (progress_tx, progress_rx) = watch::channel(PrefetchProgress {
            total: self.tile_count(),
            ..Default::default()
        });
        let cancel_token = CancellationToken::new();
        let task_cancel = cancel_token.clone();

        let task = tokio::task::spawn_blocking(move || self.run(&task_cancel, &progress_tx));

        PrefetchHandle {
            progress: progress_rx,
            cancel_token,
            task,
        }
    }

    /// Number of tiles covered by the job
    pub fn tile_count(&self) -> usize {
        self.zooms
            .clone()
            .map(|zoom| tiles_for_region(&self.viewport, zoom).len())
            .sum()
    }

    /// Run the prefetch on the calling thread
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(
        &self,
        cancel: &CancellationToken,
        progress: &watch::Sender<PrefetchProgress>,
    ) -> PrefetchReport {
        tracing::info!(
            "Prefetching {} tile(s) for zoom {}..={}",
            self.tile_count(),
            self.zooms.start(),
            self.zooms.end()
        );

        let mut report = PrefetchReport::default();
        for zoom in self.zooms.clone() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            progress.send_modify(|p| p.zoom = Some(zoom));

            let tiles: Vec<_> = tiles_for_region(&self.viewport, zoom).iter().collect();
            let level = tiles
                .par_iter()
                .map(|&index| {
                    if cancel.is_cancelled() {
                        return PrefetchReport {
                            cancelled: true,
                            ..Default::default()
                        };
                    }
                    let mut tally = PrefetchReport::default();
                    match self.store.materialize(index) {
                        Ok(Materialized::Copied) => tally.copied = 1,
                        Ok(Materialized::AlreadyCached) => tally.already_cached = 1,
                        Ok(Materialized::Missing) => {
                            tracing::debug!("Tile {index} is not bundled");
                            tally.missing = 1;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to cache tile {index}: {e}");
                            tally.failed = 1;
                        }
                    }
                    progress.send_modify(|p| p.processed += 1);
                    tally
                })
                .reduce(PrefetchReport::default, PrefetchReport::merge);

            tracing::debug!(
                zoom,
                copied = level.copied,
                cached = level.already_cached,
                missing = level.missing,
                failed = level.failed,
                "Prefetched zoom level"
            );
            report = report.merge(level);
        }

        progress.send_modify(|p| p.finished = true);
        if report.cancelled {
            tracing::info!("Tile prefetch cancelled after {} tile(s)", report.processed());
        } else {
            tracing::info!(
                "Tile prefetch done: {} copied, {} already cached, {} missing, {} failed",
                report.copied,
                report.already_cached,
                report.missing,
                report.failed
            );
        }
        report
    }
}

/// Handle to a running prefetch
pub struct PrefetchHandle {
    progress: watch::Receiver<PrefetchProgress>,
    cancel_token: CancellationToken,
    task: JoinHandle<PrefetchReport>,
}

impl std::fmt::Debug for PrefetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchHandle")
            .field("progress", &*self.progress.borrow())
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl PrefetchHandle {
    /// Latest progress snapshot
    pub fn progress(&self) -> PrefetchProgress {
        *self.progress.borrow()
    }

    /// Receiver that is notified on every progress change
    pub fn subscribe(&self) -> watch::Receiver<PrefetchProgress> {
        self.progress.clone()
    }

    /// Completion flag for loading indicators
    pub fn is_finished(&self) -> bool {
        self.task.is_finished() || self.progress.borrow().finished
    }

    /// Ask the job to stop; tiles already copied stay in the cache
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Wait for the job and return its tally
    pub async fn wait(self) -> Result<PrefetchReport> {
        self.task
            .await
            .map_err(|e| DataError::Task(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::point_to_tile;
    use crate::{GeoPoint, TileIndex};
    use std::collections::HashMap;
    use std::path::PathBuf;

    const CENTER: GeoPoint = GeoPoint::new(50.9097, -1.4044);

    fn temp_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("guide-map-prefetch-{name}-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    /// Store bundling only the z12 tile under the Southampton centre
    fn store(cache: &PathBuf) -> Arc<TileStore> {
        let bundled = point_to_tile(CENTER, 12);
        assert_eq!(bundled, TileIndex::new(12, 2032, 1372));
        let assets = HashMap::from([(bundled.asset_name(), b"tile".to_vec())]);
        Arc::new(TileStore::new(assets, cache, 4))
    }

    #[tokio::test]
    async fn test_prefetch_copies_bundled_tiles() {
        let cache = temp_dir("copy");
        let store = store(&cache);
        let viewport = Viewport::new(CENTER, 0.0, 0.0);

        let handle = TilePrefetcher::spawn(Arc::clone(&store), viewport, 12..=13);
        assert_eq!(handle.progress().total, 2);
        let mut progress = handle.subscribe();
        let report = handle.wait().await.unwrap();
        assert_eq!(
            report,
            PrefetchReport {
                copied: 1,
                missing: 1,
                ..Default::default()
            }
        );
        let last = *progress.borrow_and_update();
        assert!(last.finished);
        assert_eq!(last.processed, 2);
        assert_eq!(last.zoom, Some(13));
        assert!(store.cache_path(TileIndex::new(12, 2032, 1372)).is_file());

        // Second run finds the tile cached
        let report = TilePrefetcher::spawn(store, viewport, 12..=13)
            .wait()
            .await
            .unwrap();
        assert_eq!(report.already_cached, 1);
        assert_eq!(report.copied, 0);

        std::fs::remove_dir_all(&cache).ok();
    }

    #[test]
    fn test_cancelled_before_start() {
        let cache = temp_dir("cancel");
        let prefetcher = TilePrefetcher::new(store(&cache), Viewport::new(CENTER, 0.05, 0.05), 12..=16);
        assert!(prefetcher.tile_count() > 5);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, rx) = watch::channel(PrefetchProgress::default());
        let report = prefetcher.run(&cancel, &tx);

        assert!(report.cancelled);
        assert_eq!(report.processed(), 0);
        assert!(rx.borrow().finished);
        assert!(!cache.exists());
    }
}
