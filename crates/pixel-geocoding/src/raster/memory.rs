//! Coordinate raster holding both planes in memory.

use rayon::prelude::*;
use tracing::{debug, warn};

use super::{CoordinateBands, CoordinateRaster};
use crate::error::{GeoCodingError, Result};
use crate::estimator::Estimator;
use crate::types::{GeoPos, LatLonBlock, PixelPos, PixelRect};

/// Full in-memory coordinate access.
#[derive(Debug, Clone)]
pub struct InMemoryCoordinateRaster {
    width: usize,
    height: usize,
    lat: Vec<f32>,
    lon: Vec<f32>,
}

impl InMemoryCoordinateRaster {
    /// Load both planes. With a validity mask and an estimator, invalid
    /// pixels are overwritten with estimated coordinates, rows in parallel.
    pub fn new(bands: &CoordinateBands, estimator: Option<&dyn Estimator>) -> Result<Self> {
        let (width, height) = (bands.width(), bands.height());
        let full = PixelRect::new(0, 0, width as i64, height as i64);
        let (mut lat, mut lon) = bands.read_lat_lon(&full)?;

        match (bands.read_mask(&full)?, estimator) {
            (Some(mask), Some(estimator)) => {
                fill_invalid_gaps(width, &mask, estimator, &mut lat, &mut lon);
            }
            (Some(_), None) => warn!("valid mask ignored: no estimator to fill invalid pixels"),
            (None, _) => {}
        }

        debug!(width, height, "loaded coordinate planes into memory");
        Ok(Self {
            width,
            height,
            lat,
            lon,
        })
    }
}

fn fill_invalid_gaps(
    width: usize,
    mask: &[bool],
    estimator: &dyn Estimator,
    lat: &mut [f32],
    lon: &mut [f32],
) {
    lat.par_chunks_mut(width)
        .zip(lon.par_chunks_mut(width))
        .zip(mask.par_chunks(width))
        .enumerate()
        .for_each(|(y, ((lat_row, lon_row), mask_row))| {
            for (x, valid) in mask_row.iter().enumerate() {
                if !*valid {
                    let geo = estimator.geo_pos(PixelPos::new(x as f64 + 0.5, y as f64 + 0.5));
                    lat_row[x] = geo.lat as f32;
                    lon_row[x] = geo.lon as f32;
                }
            }
        });
}

impl CoordinateRaster for InMemoryCoordinateRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn sample(&self, x: usize, y: usize) -> Result<GeoPos> {
        if x >= self.width || y >= self.height {
            return Err(GeoCodingError::out_of_bounds(x, y, self.width, self.height));
        }
        let i = y * self.width + x;
        Ok(GeoPos::new(self.lat[i] as f64, self.lon[i] as f64))
    }

    fn sample_rect(&self, rect: &PixelRect) -> Result<LatLonBlock> {
        let clipped = rect.clip(self.width, self.height);
        if clipped.is_empty() {
            return Ok(LatLonBlock::empty(clipped));
        }
        let mut lat = Vec::with_capacity(clipped.area());
        let mut lon = Vec::with_capacity(clipped.area());
        for y in clipped.y as usize..clipped.bottom() as usize {
            let start = y * self.width + clipped.x as usize;
            let end = start + clipped.width as usize;
            lat.extend(self.lat[start..end].iter().map(|v| *v as f64));
            lon.extend(self.lon[start..end].iter().map(|v| *v as f64));
        }
        Ok(LatLonBlock {
            rect: clipped,
            lat,
            lon,
        })
    }

    fn memory_usage(&self) -> usize {
        (self.lat.len() + self.lon.len()) * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::AffineEstimator;
    use crate::raster::{ArrayMask, FnMask};
    use std::sync::Arc;

    fn bands(w: usize, h: usize) -> CoordinateBands {
        let lat: Vec<f32> = (0..w * h).map(|i| (i / w) as f32).collect();
        let lon: Vec<f32> = (0..w * h).map(|i| (i % w) as f32).collect();
        CoordinateBands::from_arrays(w, h, lat, lon).unwrap()
    }

    #[test]
    fn test_sample_and_rect() {
        let raster = InMemoryCoordinateRaster::new(&bands(5, 4), None).unwrap();
        assert_eq!(raster.sample(4, 3).unwrap(), GeoPos::new(3.0, 4.0));
        assert!(raster.sample(5, 0).is_err());

        let block = raster.sample_rect(&PixelRect::new(3, -1, 4, 3)).unwrap();
        assert_eq!(block.rect, PixelRect::new(3, 0, 2, 2));
        assert_eq!(block.get(4, 1), GeoPos::new(1.0, 4.0));
        assert_eq!(raster.memory_usage(), 2 * 20 * 4);
        assert!(raster.cache_stats().is_none());
    }

    #[test]
    fn test_gaps_filled_from_estimator() {
        let bands = bands(6, 6)
            .with_valid_mask(Arc::new(FnMask::new(6, 6, |x, y| !(x == 2 && y == 4))))
            .unwrap();
        let est = AffineEstimator::new([1.0, 0.0, -30.0, 0.0, 1.0, 40.0]).unwrap();
        let raster = InMemoryCoordinateRaster::new(&bands, Some(&est)).unwrap();
        assert_eq!(raster.sample(2, 4).unwrap(), GeoPos::new(44.5, -27.5));
        assert_eq!(raster.sample(3, 4).unwrap(), GeoPos::new(4.0, 3.0));
    }

    #[test]
    fn test_mask_without_estimator_keeps_samples() {
        let bands = bands(3, 3)
            .with_valid_mask(Arc::new(ArrayMask::new(3, 3, vec![false; 9]).unwrap()))
            .unwrap();
        let raster = InMemoryCoordinateRaster::new(&bands, None).unwrap();
        assert_eq!(raster.sample(2, 1).unwrap(), GeoPos::new(1.0, 2.0));
    }
}
