//! Configuration for pixel geo-coding.

use serde::{Deserialize, Serialize};

use crate::error::{GeoCodingError, Result};

/// Configuration for a [`PixelGeoCoding`](crate::PixelGeoCoding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelGeoCodingConfig {
    /// Read coordinate samples tile by tile instead of loading whole planes.
    pub use_tiling: bool,

    /// Bilinear forward mapping inside pixels. Only honoured in tiling mode.
    pub fraction_accuracy: bool,

    /// Half-width of the local search window, in pixels.
    pub search_radius: usize,

    /// Stride of the tie-point grid used for the internal estimator.
    pub tie_point_subsampling: usize,

    /// Edge length of the square coordinate tiles, in pixels.
    pub tile_size: usize,

    /// Memory budget for decoded coordinate tiles in megabytes.
    pub tile_cache_size_mb: usize,
}

impl Default for PixelGeoCodingConfig {
    fn default() -> Self {
        Self {
            use_tiling: true,
            fraction_accuracy: false,
            search_radius: 5,
            tie_point_subsampling: 30,
            tile_size: 512,
            tile_cache_size_mb: 64,
        }
    }
}

impl PixelGeoCodingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_USE_TILING") {
            config.use_tiling = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_FRACTION_ACCURACY") {
            config.fraction_accuracy = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_SEARCH_RADIUS") {
            if let Ok(radius) = val.parse() {
                config.search_radius = radius;
            }
        }

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_TIE_POINT_SUBSAMPLING") {
            if let Ok(step) = val.parse() {
                config.tie_point_subsampling = step;
            }
        }

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("PIXEL_GEOCODING_TILE_CACHE_MB") {
            if let Ok(size) = val.parse() {
                config.tile_cache_size_mb = size;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.search_radius < 2 {
            return Err(GeoCodingError::config_error("search_radius must be >= 2"));
        }

        if self.tie_point_subsampling < 2 {
            return Err(GeoCodingError::config_error(
                "tie_point_subsampling must be >= 2",
            ));
        }

        if self.tile_size < 2 {
            return Err(GeoCodingError::config_error("tile_size must be >= 2"));
        }

        if self.tile_cache_size_mb == 0 {
            return Err(GeoCodingError::config_error("tile_cache_size_mb must be > 0"));
        }

        Ok(())
    }

    /// Whether forward lookups interpolate inside pixels.
    pub fn fraction_accuracy_enabled(&self) -> bool {
        self.use_tiling && self.fraction_accuracy
    }

    /// Get the tile cache size in bytes.
    pub fn tile_cache_size_bytes(&self) -> usize {
        self.tile_cache_size_mb * 1024 * 1024
    }

    /// The raster implementation this configuration selects.
    pub fn raster_mode(&self) -> RasterMode {
        if self.use_tiling {
            RasterMode::Tiled
        } else {
            RasterMode::InMemory
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// How coordinate samples are held while searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterMode {
    /// Tiles are read on demand and kept in a bounded cache.
    Tiled,
    /// Both planes are loaded completely at initialization.
    InMemory,
}

impl RasterMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" | "in_memory" | "full" => Self::InMemory,
            _ => Self::Tiled,
        }
    }

    /// Get the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiled => "tiled",
            Self::InMemory => "in_memory",
        }
    }
}

impl std::fmt::Display for RasterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
