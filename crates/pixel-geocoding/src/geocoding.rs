//! The pixel geo-coding: forward and inverse mapping over coordinate bands.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info};

use crate::antimeridian::{crosses_antimeridian, interpolate, interpolate_lon, pixel_boundary};
use crate::config::{PixelGeoCodingConfig, RasterMode};
use crate::error::{GeoCodingError, Result};
use crate::estimator::{convergence_threshold, Estimator, EstimatorHandle, TiePointEstimator};
use crate::raster::{
    CoordinateBands, CoordinateRaster, InMemoryCoordinateRaster, TiledCoordinateRaster,
};
use crate::search::{LocalWindowSearch, QuadTreeSearch};
use crate::types::{CacheStats, GeoPos, PixelPos, PixelRect};

/// Estimator in use together with the match threshold derived from it.
struct EstimatorState {
    handle: EstimatorHandle,
    threshold: f64,
}

/// Geo-coding backed by per-pixel latitude and longitude bands.
///
/// Nothing is read until the first lookup (or [`PixelGeoCoding::open`]). The
/// estimator, the coordinate raster and the antimeridian flag are then built
/// exactly once, even when several threads race on first use; a failed
/// initialization is retried by the next call. Dropping the geo-coding drops
/// the raster and any internally built estimator; an external estimator only
/// loses this instance's reference.
pub struct PixelGeoCoding {
    bands: CoordinateBands,
    external: Option<Arc<dyn Estimator>>,
    config: PixelGeoCodingConfig,
    estimator: OnceCell<Option<EstimatorState>>,
    raster: OnceCell<Box<dyn CoordinateRaster>>,
    crossing: OnceCell<bool>,
}

impl PixelGeoCoding {
    /// Create a lazily initialized geo-coding.
    ///
    /// Fails with [`GeoCodingError::InvalidInput`] for bands smaller than 2x2
    /// or a search radius below 2, and with [`GeoCodingError::ConfigError`]
    /// for other unusable settings.
    pub fn new(
        bands: CoordinateBands,
        estimator: Option<Arc<dyn Estimator>>,
        config: PixelGeoCodingConfig,
    ) -> Result<Self> {
        let (w, h) = (bands.width(), bands.height());
        if w < 2 || h < 2 {
            return Err(GeoCodingError::invalid_input(format!(
                "raster must be at least 2x2, got {}x{}",
                w, h
            )));
        }
        if bands.longitude.width() != w || bands.longitude.height() != h {
            return Err(GeoCodingError::invalid_input(
                "latitude and longitude bands differ in size",
            ));
        }
        if config.search_radius < 2 {
            return Err(GeoCodingError::invalid_input(format!(
                "search radius must be >= 2, got {}",
                config.search_radius
            )));
        }
        config.validate()?;

        Ok(Self {
            bands,
            external: estimator,
            config,
            estimator: OnceCell::new(),
            raster: OnceCell::new(),
            crossing: OnceCell::new(),
        })
    }

    /// Create a geo-coding and initialize it immediately.
    pub fn open(
        bands: CoordinateBands,
        estimator: Option<Arc<dyn Estimator>>,
        config: PixelGeoCodingConfig,
    ) -> Result<Self> {
        let geocoding = Self::new(bands, estimator, config)?;
        geocoding.is_crossing_antimeridian()?;
        Ok(geocoding)
    }

    fn estimator_state(&self) -> Result<Option<&EstimatorState>> {
        let state = self.estimator.get_or_try_init(|| self.build_estimator())?;
        Ok(state.as_ref())
    }

    fn build_estimator(&self) -> Result<Option<EstimatorState>> {
        let handle = if let Some(external) = &self.external {
            EstimatorHandle::External(Arc::clone(external))
        } else if self.wants_internal_estimator() {
            let step = self.config.tie_point_subsampling;
            let estimator = TiePointEstimator::from_bands(&self.bands, step)?;
            info!(
                tie_points = ?estimator.grid().dimensions(),
                subsampling = step,
                inverse = estimator.has_inverse(),
                "built tie-point estimator"
            );
            EstimatorHandle::Internal(Arc::new(estimator))
        } else {
            debug!("no estimator; lookups use the quad-tree search");
            return Ok(None);
        };

        let threshold = convergence_threshold(handle.as_estimator());
        debug!(threshold, internal = handle.is_internal(), "estimator ready");
        Ok(Some(EstimatorState { handle, threshold }))
    }

    fn wants_internal_estimator(&self) -> bool {
        let step = self.config.tie_point_subsampling;
        self.config.use_tiling && self.width() / step > 1 && self.height() / step > 1
    }

    fn raster(&self) -> Result<&dyn CoordinateRaster> {
        let raster = self.raster.get_or_try_init(|| self.build_raster())?;
        Ok(raster.as_ref())
    }

    fn build_raster(&self) -> Result<Box<dyn CoordinateRaster>> {
        let estimator = self.estimator_state()?.map(|s| s.handle.as_estimator());
        let mode = self.config.raster_mode();
        info!(
            width = self.width(),
            height = self.height(),
            mode = %mode,
            valid_mask = self.bands.valid_mask.is_some(),
            "initializing coordinate raster"
        );
        Ok(match mode {
            RasterMode::Tiled => Box::new(TiledCoordinateRaster::new(
                self.bands.clone(),
                estimator,
                &self.config,
            )?),
            RasterMode::InMemory => {
                Box::new(InMemoryCoordinateRaster::new(&self.bands, estimator)?)
            }
        })
    }

    /// Whether the raster boundary jumps across the ±180° meridian.
    /// Computed on first use and cached.
    pub fn is_crossing_antimeridian(&self) -> Result<bool> {
        self.crossing
            .get_or_try_init(|| -> Result<bool> {
                let raster = self.raster()?;
                let lons = pixel_boundary(raster.width(), raster.height(), 1)
                    .into_iter()
                    .map(|(x, y)| raster.sample(x, y).map(|g| g.lon))
                    .collect::<Result<Vec<_>>>()?;
                let crossing = crosses_antimeridian(lons);
                debug!(crossing, "antimeridian check done");
                Ok(crossing)
            })
            .copied()
    }

    /// Inverse mapping: the pixel centre whose coordinates best match `geo`.
    ///
    /// Positions outside the raster's coverage give the invalid sentinel;
    /// `Err` is reserved for failures reading the bands.
    pub fn resolve_pixel(&self, geo: GeoPos) -> Result<PixelPos> {
        if !geo.lat.is_finite() || !geo.lon.is_finite() {
            return Ok(PixelPos::invalid());
        }
        let target = geo.normalized();
        let raster = self.raster()?;
        let crossing = self.is_crossing_antimeridian()?;
        let quad_tree = QuadTreeSearch::new(raster, crossing);

        match self.estimator_state()? {
            Some(state) => LocalWindowSearch::new(
                raster,
                state.handle.as_estimator(),
                self.config.search_radius,
                state.threshold,
                quad_tree,
            )
            .find(target),
            None => quad_tree.find(target),
        }
    }

    /// Forward mapping: coordinates of a pixel position.
    ///
    /// Inside the raster this is the containing pixel's sample or, with
    /// fraction accuracy, a bilinear blend of the surrounding 2x2 samples.
    /// Outside it, the estimator answers if there is one.
    pub fn resolve_geo_pos(&self, pixel: PixelPos) -> Result<GeoPos> {
        if !pixel.is_valid() {
            return Ok(GeoPos::invalid());
        }
        let Some((x, y)) = pixel.floor_within(self.width(), self.height()) else {
            return Ok(match self.estimator_state()? {
                Some(state) => state.handle.as_estimator().geo_pos(pixel),
                None => GeoPos::invalid(),
            });
        };

        let raster = self.raster()?;
        if !self.config.fraction_accuracy_enabled() {
            return raster.sample(x, y);
        }

        let x0 = block_origin(x, pixel.x, self.width());
        let y0 = block_origin(y, pixel.y, self.height());
        let wx = pixel.x - (x0 as f64 + 0.5);
        let wy = pixel.y - (y0 as f64 + 0.5);
        let block = raster.sample_rect(&PixelRect::new(x0 as i64, y0 as i64, 2, 2))?;
        let (p00, p10) = (block.get(x0, y0), block.get(x0 + 1, y0));
        let (p01, p11) = (block.get(x0, y0 + 1), block.get(x0 + 1, y0 + 1));

        Ok(GeoPos::new(
            interpolate(wx, wy, p00.lat, p10.lat, p01.lat, p11.lat),
            interpolate_lon(wx, wy, p00.lon, p10.lon, p01.lon, p11.lon),
        ))
    }

    pub fn width(&self) -> usize {
        self.bands.width()
    }

    pub fn height(&self) -> usize {
        self.bands.height()
    }

    pub fn config(&self) -> &PixelGeoCodingConfig {
        &self.config
    }

    pub fn search_radius(&self) -> usize {
        self.config.search_radius
    }

    /// The caller-supplied estimator. An internally built estimator is never
    /// returned.
    pub fn estimator(&self) -> Option<Arc<dyn Estimator>> {
        self.external.clone()
    }

    /// Whether lookups are seeded by an estimator built from the bands.
    pub fn uses_internal_estimator(&self) -> Result<bool> {
        Ok(self
            .estimator_state()?
            .map_or(false, |s| s.handle.is_internal()))
    }

    /// Whether the validity mask takes effect. It needs an estimator to
    /// supply replacement coordinates.
    pub fn uses_valid_mask(&self) -> Result<bool> {
        Ok(self.bands.valid_mask.is_some() && self.estimator_state()?.is_some())
    }

    /// Tile cache statistics, once a tiled raster has been initialized.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.raster.get().and_then(|r| r.cache_stats())
    }

    /// Bytes currently held by the coordinate raster.
    pub fn memory_usage(&self) -> usize {
        self.raster.get().map_or(0, |r| r.memory_usage())
    }

    /// Upper estimate of the memory a geo-coding over a `width x height`
    /// raster needs with `config`.
    pub fn required_memory(
        width: usize,
        height: usize,
        config: &PixelGeoCodingConfig,
        uses_mask: bool,
    ) -> usize {
        let pixels = width * height;
        let planes = 2 * std::mem::size_of::<f32>() * pixels;
        let step = config.tie_point_subsampling.max(1);
        let tie_points = 2 * std::mem::size_of::<f32>() * (width / step) * (height / step);

        match config.raster_mode() {
            RasterMode::InMemory => planes + if uses_mask { pixels } else { 0 },
            RasterMode::Tiled => {
                let mask_stripe = if uses_mask { width * config.tile_size } else { 0 };
                planes.min(config.tile_cache_size_bytes()) + mask_stripe + tie_points
            }
        }
    }
}

/// Left (or top) column of the 2x2 block used for fraction accuracy.
fn block_origin(floor: usize, pos: f64, size: usize) -> usize {
    let frac = pos - floor as f64;
    if (floor > 0 && frac < 0.5) || floor == size - 1 {
        floor - 1
    } else {
        floor
    }
}

impl std::fmt::Debug for PixelGeoCoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelGeoCoding")
            .field("bands", &self.bands)
            .field("config", &self.config)
            .field("external_estimator", &self.external.is_some())
            .field("initialized", &self.raster.get().is_some())
            .finish()
    }
}
