//! Core value types shared by the rasters, estimators and searches.

use serde::{Deserialize, Serialize};

use crate::antimeridian;

/// A fractional pixel coordinate. Pixel `(i, j)` covers `[i, i+1) x [j, j+1)`.
///
/// NaN coordinates mark "no position".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The invalid sentinel.
    pub fn invalid() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }

    /// Integer pixel containing this position, if it lies inside a
    /// `width x height` raster.
    pub fn floor_within(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        if !self.is_valid() {
            return None;
        }
        let x = self.x.floor();
        let y = self.y.floor();
        if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 {
            return None;
        }
        Some((x as usize, y as usize))
    }
}

/// A geographic position in degrees. NaN components mark "no position".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The invalid sentinel.
    pub fn invalid() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.lat.is_nan() && !self.lon.is_nan()
    }

    /// Same position with the longitude wrapped into `[-180, 180]`.
    ///
    /// Longitudes already inside the range, including both ends, are kept.
    pub fn normalized(&self) -> Self {
        Self {
            lat: self.lat,
            lon: antimeridian::normalize_lon(self.lon),
        }
    }
}

/// A rectangular pixel region. The origin may be negative before clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square window of side `2 * radius + 1` centred on `(cx, cy)`.
    pub fn centered(cx: usize, cy: usize, radius: usize) -> Self {
        let r = radius as i64;
        Self::new(cx as i64 - r, cy as i64 - r, 2 * r + 1, 2 * r + 1)
    }

    /// Intersect with the raster `[0, width) x [0, height)`.
    ///
    /// A rectangle that misses the raster clips to zero area.
    pub fn clip(&self, width: usize, height: usize) -> Self {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width.max(0)).min(width as i64);
        let y1 = (self.y + self.height.max(0)).min(height as i64);
        Self::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.width * self.height) as usize
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Planar lat/lon samples for a clipped pixel region.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonBlock {
    pub rect: PixelRect,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl LatLonBlock {
    /// A block without samples.
    pub fn empty(rect: PixelRect) -> Self {
        Self {
            rect,
            lat: Vec::new(),
            lon: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    fn index(&self, x: usize, y: usize) -> usize {
        let col = x as i64 - self.rect.x;
        let row = y as i64 - self.rect.y;
        debug_assert!(self.rect.contains(x as i64, y as i64));
        (row * self.rect.width + col) as usize
    }

    /// Sample at absolute raster coordinates inside `rect`.
    pub fn get(&self, x: usize, y: usize) -> GeoPos {
        let i = self.index(x, y);
        GeoPos::new(self.lat[i], self.lon[i])
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Check if a point is contained within this bounding box (edges included).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Tile cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
