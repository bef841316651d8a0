//! Substitute coordinates for pixels the validity mask rejects.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::estimator::Estimator;
use crate::raster::CoordinateBands;
use crate::types::{PixelPos, PixelRect};

/// Estimated `(lat, lon)` for every invalid pixel, keyed by `(y, x)` so a
/// row segment is one range query.
#[derive(Debug, Clone, Default)]
pub struct GapFill {
    substitutes: BTreeMap<(usize, usize), (f32, f32)>,
}

impl GapFill {
    /// Scan the mask in stripes of `stripe_rows` rows and estimate every
    /// invalid pixel at its centre.
    pub fn collect(
        bands: &CoordinateBands,
        estimator: &dyn Estimator,
        stripe_rows: usize,
    ) -> Result<Self> {
        let (w, h) = (bands.width(), bands.height());
        let stripe_rows = stripe_rows.max(1);
        let mut substitutes = BTreeMap::new();

        let mut y0 = 0;
        while y0 < h {
            let rows = stripe_rows.min(h - y0);
            let rect = PixelRect::new(0, y0 as i64, w as i64, rows as i64);
            let Some(mask) = bands.read_mask(&rect)? else {
                return Ok(Self::default());
            };
            for (i, valid) in mask.iter().enumerate() {
                if *valid {
                    continue;
                }
                let x = i % w;
                let y = y0 + i / w;
                let geo = estimator.geo_pos(PixelPos::new(x as f64 + 0.5, y as f64 + 0.5));
                substitutes.insert((y, x), (geo.lat as f32, geo.lon as f32));
            }
            y0 += rows;
        }

        debug!(invalid_pixels = substitutes.len(), "collected gap substitutes");
        Ok(Self { substitutes })
    }

    pub fn len(&self) -> usize {
        self.substitutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutes.is_empty()
    }

    /// Overwrite the invalid pixels of a row-major block covering `rect`.
    pub fn apply(&self, rect: &PixelRect, lat: &mut [f32], lon: &mut [f32]) {
        if self.substitutes.is_empty() || rect.is_empty() {
            return;
        }
        let x0 = rect.x as usize;
        let x1 = rect.right() as usize;
        let width = rect.width as usize;
        for y in rect.y as usize..rect.bottom() as usize {
            let row = (y - rect.y as usize) * width;
            for (&(_, x), &(sub_lat, sub_lon)) in self.substitutes.range((y, x0)..(y, x1)) {
                lat[row + x - x0] = sub_lat;
                lon[row + x - x0] = sub_lon;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::AffineEstimator;
    use crate::raster::ArrayMask;
    use std::sync::Arc;

    #[test]
    fn test_collect_and_apply() {
        let bands = CoordinateBands::from_arrays(4, 3, vec![f32::NAN; 12], vec![f32::NAN; 12])
            .unwrap();
        let mut mask = vec![true; 12];
        mask[5] = false; // (1, 1)
        mask[11] = false; // (3, 2)
        let bands = bands
            .with_valid_mask(Arc::new(ArrayMask::new(4, 3, mask).unwrap()))
            .unwrap();
        let est = AffineEstimator::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();

        let gaps = GapFill::collect(&bands, &est, 2).unwrap();
        assert_eq!(gaps.len(), 2);

        let rect = PixelRect::new(1, 1, 3, 2);
        let mut lat = vec![0.0f32; 6];
        let mut lon = vec![0.0f32; 6];
        gaps.apply(&rect, &mut lat, &mut lon);
        assert_eq!((lat[0], lon[0]), (1.5, 1.5));
        assert_eq!((lat[5], lon[5]), (2.5, 3.5));
        assert_eq!(lat[1], 0.0);
    }

    #[test]
    fn test_no_mask_collects_nothing() {
        let bands = CoordinateBands::from_arrays(2, 2, vec![0.0f32; 4], vec![0.0f32; 4]).unwrap();
        let est = AffineEstimator::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
        assert!(GapFill::collect(&bands, &est, 8).unwrap().is_empty());
    }
}
