//! Pixel-based geo-coding for swath rasters.
//!
//! A scene whose geolocation is given per pixel by a latitude band and a
//! longitude band has no closed-form inverse. This crate finds, for a
//! geographic position, the pixel whose stored coordinates are closest.
//!
//! ```text
//!                    GeoPos
//!                      |
//!               PixelGeoCoding ---- lazy, once: estimator, raster, crossing
//!                 /          \
//!   estimator present      no estimator
//!          |                    |
//!  LocalWindowSearch  -->  QuadTreeSearch      (fallback on unusable guesses)
//!          \                   /
//!           CoordinateRaster (trait)
//!            /              \
//!  TiledCoordinateRaster   InMemoryCoordinateRaster
//!   (LRU tile cache,        (both planes loaded,
//!    gap substitutes)        gaps filled in place)
//!            \              /
//!      CoordinateBands: latitude, longitude, optional valid mask
//! ```
//!
//! # Example
//!
//! ```
//! use pixel_geocoding::{CoordinateBands, GeoPos, PixelGeoCoding, PixelGeoCodingConfig};
//!
//! let (w, h) = (4, 4);
//! let lat: Vec<f32> = (0..w * h).map(|i| 10.0 + (i / w) as f32 * 0.01).collect();
//! let lon: Vec<f32> = (0..w * h).map(|i| 20.0 + (i % w) as f32 * 0.01).collect();
//! let bands = CoordinateBands::from_arrays(w, h, lat, lon)?;
//!
//! let geocoding = PixelGeoCoding::new(bands, None, PixelGeoCodingConfig::default())?;
//! let pixel = geocoding.resolve_pixel(GeoPos::new(10.01, 20.02))?;
//! assert_eq!((pixel.x, pixel.y), (2.5, 1.5));
//! # Ok::<(), pixel_geocoding::GeoCodingError>(())
//! ```

pub mod antimeridian;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimator;
pub mod geocoding;
pub mod raster;
pub mod search;
pub mod types;

pub use config::{PixelGeoCodingConfig, RasterMode};
pub use error::{GeoCodingError, Result};
pub use estimator::{AffineEstimator, Estimator, TiePointEstimator, TiePointGrid};
pub use geocoding::PixelGeoCoding;
pub use raster::{
    ArrayBand, ArrayMask, CoordinateBands, CoordinateRaster, FnMask, InMemoryCoordinateRaster,
    RasterBand, TiledCoordinateRaster, ValidMask,
};
pub use search::{LocalWindowSearch, QuadTreeSearch};
pub use types::{BoundingBox, CacheStats, GeoPos, PixelPos, PixelRect};
