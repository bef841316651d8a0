//! Random access to latitude/longitude samples.
//!
//! Two implementations share the [`CoordinateRaster`] contract:
//!
//! ```text
//!                      CoordinateBands (lat, lon, mask?)
//!                                  │
//!              ┌───────────────────┴───────────────────┐
//!              ▼                                       ▼
//!   TiledCoordinateRaster                   InMemoryCoordinateRaster
//!   tiles read on demand,                   both planes loaded once,
//!   LRU TileCache, gap                      gaps filled in place
//!   substitutes applied per tile
//! ```
//!
//! Invalid pixels (mask `false`) are replaced by the estimator's geo-position
//! of the pixel centre, so searches never see a raw invalid sample.

mod band;
mod gap_fill;
mod memory;
mod tiled;

pub use band::{ArrayBand, ArrayMask, CoordinateBands, FnMask, RasterBand, ValidMask};
pub use gap_fill::GapFill;
pub use memory::InMemoryCoordinateRaster;
pub use tiled::TiledCoordinateRaster;

use crate::error::Result;
use crate::types::{CacheStats, GeoPos, LatLonBlock, PixelRect};

/// Read access to per-pixel coordinates.
pub trait CoordinateRaster: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Coordinates of pixel `(x, y)`, which must lie inside the raster.
    fn sample(&self, x: usize, y: usize) -> Result<GeoPos>;

    /// Coordinates of `rect` clipped to the raster. A rectangle that misses
    /// the raster yields an empty block.
    fn sample_rect(&self, rect: &PixelRect) -> Result<LatLonBlock>;

    /// Tile cache statistics, for implementations that cache.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }

    /// Bytes held by the raster's sample buffers.
    fn memory_usage(&self) -> usize;
}
