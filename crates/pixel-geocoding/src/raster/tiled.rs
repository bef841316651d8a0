//! Coordinate raster that reads square tiles on demand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::{CoordinateBands, CoordinateRaster, GapFill};
use crate::cache::{LatLonTile, TileCache, TileKey};
use crate::config::PixelGeoCodingConfig;
use crate::error::{GeoCodingError, Result};
use crate::estimator::Estimator;
use crate::types::{CacheStats, GeoPos, LatLonBlock, PixelRect};

/// Tile-backed coordinate access.
///
/// Band reads happen outside the cache lock, so two threads missing the same
/// tile may both read it; the second insert simply replaces the first.
pub struct TiledCoordinateRaster {
    bands: CoordinateBands,
    tile_size: usize,
    cache: Mutex<TileCache>,
    gaps: GapFill,
}

impl TiledCoordinateRaster {
    /// Create the raster. With a validity mask and an estimator, substitutes
    /// for every invalid pixel are computed up front.
    pub fn new(
        bands: CoordinateBands,
        estimator: Option<&dyn Estimator>,
        config: &PixelGeoCodingConfig,
    ) -> Result<Self> {
        let tile_size = config.tile_size.max(2);
        let gaps = match (bands.valid_mask.is_some(), estimator) {
            (true, Some(estimator)) => GapFill::collect(&bands, estimator, tile_size)?,
            (true, None) => {
                warn!("valid mask ignored: no estimator to fill invalid pixels");
                GapFill::default()
            }
            (false, _) => GapFill::default(),
        };

        debug!(
            width = bands.width(),
            height = bands.height(),
            tile_size,
            cache_mb = config.tile_cache_size_mb,
            "tiled coordinate raster ready"
        );

        Ok(Self {
            tile_size,
            cache: Mutex::new(TileCache::new(config.tile_cache_size_bytes(), tile_size)),
            bands,
            gaps,
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, TileCache> {
        // Cached tiles are immutable; a poisoned lock still guards valid data.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tile(&self, key: TileKey) -> Result<Arc<LatLonTile>> {
        if let Some(tile) = self.lock_cache().get(&key) {
            return Ok(tile);
        }
        let tile = Arc::new(self.load_tile(key)?);
        self.lock_cache().insert(key, Arc::clone(&tile));
        Ok(tile)
    }

    fn load_tile(&self, (tx, ty): TileKey) -> Result<LatLonTile> {
        let ts = self.tile_size as i64;
        let rect = PixelRect::new(tx as i64 * ts, ty as i64 * ts, ts, ts)
            .clip(self.bands.width(), self.bands.height());
        let (mut lat, mut lon) = self.bands.read_lat_lon(&rect)?;
        self.gaps.apply(&rect, &mut lat, &mut lon);
        debug!(tile_x = tx, tile_y = ty, rect = ?rect, "loaded coordinate tile");
        Ok(LatLonTile { rect, lat, lon })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Number of invalid pixels that receive estimated coordinates.
    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }
}

impl CoordinateRaster for TiledCoordinateRaster {
    fn width(&self) -> usize {
        self.bands.width()
    }

    fn height(&self) -> usize {
        self.bands.height()
    }

    fn sample(&self, x: usize, y: usize) -> Result<GeoPos> {
        if x >= self.width() || y >= self.height() {
            return Err(GeoCodingError::out_of_bounds(
                x,
                y,
                self.width(),
                self.height(),
            ));
        }
        let tile = self.tile((x / self.tile_size, y / self.tile_size))?;
        let i = tile.index(x, y);
        Ok(GeoPos::new(tile.lat[i] as f64, tile.lon[i] as f64))
    }

    fn sample_rect(&self, rect: &PixelRect) -> Result<LatLonBlock> {
        let clipped = rect.clip(self.width(), self.height());
        if clipped.is_empty() {
            return Ok(LatLonBlock::empty(clipped));
        }

        let mut block = LatLonBlock {
            rect: clipped,
            lat: vec![0.0; clipped.area()],
            lon: vec![0.0; clipped.area()],
        };
        let ts = self.tile_size;
        let (x0, y0) = (clipped.x as usize, clipped.y as usize);
        let (x1, y1) = (clipped.right() as usize, clipped.bottom() as usize);
        let block_width = clipped.width as usize;

        for ty in y0 / ts..=(y1 - 1) / ts {
            for tx in x0 / ts..=(x1 - 1) / ts {
                let tile = self.tile((tx, ty))?;
                let tr = tile.rect;
                let cx0 = x0.max(tr.x as usize);
                let cx1 = x1.min(tr.right() as usize);
                let cy0 = y0.max(tr.y as usize);
                let cy1 = y1.min(tr.bottom() as usize);
                for y in cy0..cy1 {
                    let src = tile.index(cx0, y);
                    let dst = (y - y0) * block_width + (cx0 - x0);
                    let n = cx1 - cx0;
                    for k in 0..n {
                        block.lat[dst + k] = tile.lat[src + k] as f64;
                        block.lon[dst + k] = tile.lon[src + k] as f64;
                    }
                }
            }
        }
        Ok(block)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.lock_cache().stats())
    }

    fn memory_usage(&self) -> usize {
        self.lock_cache().memory_usage()
    }
}
