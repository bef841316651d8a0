//! Access boundary to the latitude, longitude and validity rasters.
//!
//! The storage subsystem implements [`RasterBand`] and [`ValidMask`]; this
//! crate only ever asks for rectangles that lie inside the raster.

use num_traits::Float;
use std::sync::Arc;

use crate::error::{GeoCodingError, Result};
use crate::types::PixelRect;

/// A single-channel raster of coordinate samples in degrees.
pub trait RasterBand: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Read `rect` (already clipped to the raster) in row-major order.
    fn read_block(&self, rect: &PixelRect) -> Result<Vec<f32>>;
}

/// Per-pixel validity of the coordinate samples.
pub trait ValidMask: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Read `rect` (already clipped to the raster) in row-major order;
    /// `true` marks a usable sample.
    fn read_mask(&self, rect: &PixelRect) -> Result<Vec<bool>>;
}

fn check_rect(rect: &PixelRect, width: usize, height: usize) -> Result<()> {
    if rect.x < 0
        || rect.y < 0
        || rect.is_empty()
        || rect.right() > width as i64
        || rect.bottom() > height as i64
    {
        return Err(GeoCodingError::read_failed(format!(
            "block {:?} is outside raster {}x{}",
            rect, width, height
        )));
    }
    Ok(())
}

fn copy_rows<T: Copy, U>(
    data: &[T],
    width: usize,
    rect: &PixelRect,
    mut convert: impl FnMut(T) -> U,
) -> Vec<U> {
    let mut out = Vec::with_capacity(rect.area());
    for row in rect.y..rect.bottom() {
        let start = row as usize * width + rect.x as usize;
        let end = start + rect.width as usize;
        out.extend(data[start..end].iter().map(|v| convert(*v)));
    }
    out
}

/// A band held in memory, for callers that already own the samples.
#[derive(Debug, Clone)]
pub struct ArrayBand<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Float> ArrayBand<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(GeoCodingError::invalid_input(format!(
                "band holds {} samples, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

impl<T: Float + Send + Sync> RasterBand for ArrayBand<T> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_block(&self, rect: &PixelRect) -> Result<Vec<f32>> {
        check_rect(rect, self.width, self.height)?;
        Ok(copy_rows(&self.data, self.width, rect, |v: T| {
            v.to_f32().unwrap_or(f32::NAN)
        }))
    }
}

/// A validity mask held in memory.
#[derive(Debug, Clone)]
pub struct ArrayMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl ArrayMask {
    pub fn new(width: usize, height: usize, data: Vec<bool>) -> Result<Self> {
        if data.len() != width * height {
            return Err(GeoCodingError::invalid_input(format!(
                "mask holds {} samples, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

impl ValidMask for ArrayMask {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_mask(&self, rect: &PixelRect) -> Result<Vec<bool>> {
        check_rect(rect, self.width, self.height)?;
        Ok(copy_rows(&self.data, self.width, rect, |v| v))
    }
}

/// A validity mask computed per pixel, e.g. from an evaluated valid-pixel
/// expression.
pub struct FnMask<F> {
    width: usize,
    height: usize,
    predicate: F,
}

impl<F> FnMask<F>
where
    F: Fn(usize, usize) -> bool + Send + Sync,
{
    pub fn new(width: usize, height: usize, predicate: F) -> Self {
        Self {
            width,
            height,
            predicate,
        }
    }
}

impl<F> ValidMask for FnMask<F>
where
    F: Fn(usize, usize) -> bool + Send + Sync,
{
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_mask(&self, rect: &PixelRect) -> Result<Vec<bool>> {
        check_rect(rect, self.width, self.height)?;
        let mut out = Vec::with_capacity(rect.area());
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                out.push((self.predicate)(x as usize, y as usize));
            }
        }
        Ok(out)
    }
}

/// Latitude and longitude bands plus an optional validity mask, all of the
/// same size.
#[derive(Clone)]
pub struct CoordinateBands {
    pub latitude: Arc<dyn RasterBand>,
    pub longitude: Arc<dyn RasterBand>,
    pub valid_mask: Option<Arc<dyn ValidMask>>,
}

impl CoordinateBands {
    /// Pair two bands. Both must share a size of at least 2x2.
    pub fn new(latitude: Arc<dyn RasterBand>, longitude: Arc<dyn RasterBand>) -> Result<Self> {
        let (w, h) = (latitude.width(), latitude.height());
        if longitude.width() != w || longitude.height() != h {
            return Err(GeoCodingError::invalid_input(format!(
                "latitude band is {}x{} but longitude band is {}x{}",
                w,
                h,
                longitude.width(),
                longitude.height()
            )));
        }
        if w < 2 || h < 2 {
            return Err(GeoCodingError::invalid_input(format!(
                "coordinate bands must be at least 2x2, got {}x{}",
                w, h
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            valid_mask: None,
        })
    }

    /// Attach a validity mask of the same size.
    pub fn with_valid_mask(mut self, mask: Arc<dyn ValidMask>) -> Result<Self> {
        if mask.width() != self.width() || mask.height() != self.height() {
            return Err(GeoCodingError::invalid_input(format!(
                "valid mask is {}x{} but coordinate bands are {}x{}",
                mask.width(),
                mask.height(),
                self.width(),
                self.height()
            )));
        }
        self.valid_mask = Some(mask);
        Ok(self)
    }

    /// Convenience constructor over in-memory planes.
    pub fn from_arrays<T>(width: usize, height: usize, lat: Vec<T>, lon: Vec<T>) -> Result<Self>
    where
        T: Float + Send + Sync + 'static,
    {
        Self::new(
            Arc::new(ArrayBand::new(width, height, lat)?),
            Arc::new(ArrayBand::new(width, height, lon)?),
        )
    }

    pub fn width(&self) -> usize {
        self.latitude.width()
    }

    pub fn height(&self) -> usize {
        self.latitude.height()
    }

    /// Read lat and lon for one rectangle, checking the sample counts.
    pub fn read_lat_lon(&self, rect: &PixelRect) -> Result<(Vec<f32>, Vec<f32>)> {
        let lat = self.latitude.read_block(rect)?;
        let lon = self.longitude.read_block(rect)?;
        if lat.len() != rect.area() || lon.len() != rect.area() {
            return Err(GeoCodingError::read_failed(format!(
                "block {:?} returned {} lat and {} lon samples, expected {}",
                rect,
                lat.len(),
                lon.len(),
                rect.area()
            )));
        }
        Ok((lat, lon))
    }

    /// Read the mask for one rectangle, if a mask is attached.
    pub fn read_mask(&self, rect: &PixelRect) -> Result<Option<Vec<bool>>> {
        let Some(mask) = &self.valid_mask else {
            return Ok(None);
        };
        let values = mask.read_mask(rect)?;
        if values.len() != rect.area() {
            return Err(GeoCodingError::read_failed(format!(
                "mask block {:?} returned {} samples, expected {}",
                rect,
                values.len(),
                rect.area()
            )));
        }
        Ok(Some(values))
    }
}

impl std::fmt::Debug for CoordinateBands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateBands")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("valid_mask", &self.valid_mask.is_some())
            .finish()
    }
}
