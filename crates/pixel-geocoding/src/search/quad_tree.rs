//! Exhaustive inverse search by recursive quad subdivision.

use tracing::trace;

use crate::antimeridian::{
    is_crossing_meridian_inside_quad, lon_diff, min_max, negative_lon_max, positive_lon_min,
};
use crate::error::Result;
use crate::raster::CoordinateRaster;
use crate::types::{BoundingBox, GeoPos, PixelPos};

/// Padding in degrees around a quad's corner box before pruning.
pub const QUAD_TREE_EPS: f64 = 0.04;

/// Closest pixel seen so far and its squared angular distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    pub x: usize,
    pub y: usize,
    pub distance: f64,
}

impl BestMatch {
    /// Pixel centre of the match.
    pub fn pixel_pos(&self) -> PixelPos {
        PixelPos::new(self.x as f64 + 0.5, self.y as f64 + 0.5)
    }

    fn offer(best: &mut Option<BestMatch>, x: usize, y: usize, distance: f64) {
        let improves = match best {
            Some(b) => distance < b.distance,
            None => !distance.is_nan(),
        };
        if improves {
            *best = Some(BestMatch { x, y, distance });
        }
    }
}

/// Squared angular distance with the longitude term scaled by `r`, the
/// cosine of the target latitude.
pub(crate) fn square_distance(target: GeoPos, r: f64, sample: GeoPos) -> f64 {
    let dlat = (target.lat - sample.lat).abs();
    let dlon = r * lon_diff(target.lon, sample.lon);
    dlat * dlat + dlon * dlon
}

/// Depth-first quad-tree search over a whole raster.
///
/// A quad is pruned when the target lies outside the box spanned by its four
/// corners (padded by [`QUAD_TREE_EPS`]); quads straddling the antimeridian
/// use the half of the longitude range on the target's side, padded the same
/// way toward the interior.
pub struct QuadTreeSearch<'a> {
    raster: &'a dyn CoordinateRaster,
    crossing: bool,
}

impl<'a> QuadTreeSearch<'a> {
    /// `crossing` tells whether the raster as a whole crosses the
    /// antimeridian.
    pub fn new(raster: &'a dyn CoordinateRaster, crossing: bool) -> Self {
        Self { raster, crossing }
    }

    /// Pixel centre closest to `target`, or the invalid sentinel if every
    /// quad was pruned.
    pub fn find(&self, target: GeoPos) -> Result<PixelPos> {
        Ok(self
            .find_best(target)?
            .map(|b| b.pixel_pos())
            .unwrap_or_else(PixelPos::invalid))
    }

    /// Best match over all quads that survive pruning.
    pub fn find_best(&self, target: GeoPos) -> Result<Option<BestMatch>> {
        let mut best = None;
        if target.is_valid() {
            self.search(
                target,
                0,
                0,
                self.raster.width(),
                self.raster.height(),
                &mut best,
            )?;
        }
        trace!(?target, ?best, "quad-tree search finished");
        Ok(best)
    }

    fn search(
        &self,
        target: GeoPos,
        i: usize,
        j: usize,
        w: usize,
        h: usize,
        best: &mut Option<BestMatch>,
    ) -> Result<()> {
        if w < 2 || h < 2 {
            return Ok(());
        }

        let x1 = i;
        let x2 = i + w - 1;
        let y1 = j;
        let y2 = j + h - 1;
        let corners = [(x1, y1), (x1, y2), (x2, y1), (x2, y2)];
        let mut samples = [GeoPos::invalid(); 4];
        for (sample, (x, y)) in samples.iter_mut().zip(corners) {
            *sample = self.raster.sample(x, y)?;
        }

        if !self.admits(&samples, target) {
            return Ok(());
        }

        if w == 2 && h == 2 {
            let r = target.lat.to_radians().cos();
            for ((x, y), sample) in corners.into_iter().zip(samples) {
                BestMatch::offer(best, x, y, square_distance(target, r, sample));
            }
            return Ok(());
        }

        let w2 = w >> 1;
        let h2 = h >> 1;
        let i2 = i + w2;
        let j2 = j + h2;
        let w2r = w - w2;
        let h2r = h - h2;
        let w2 = w2.max(2);
        let h2 = h2.max(2);

        self.search(target, i, j, w2, h2, best)?;
        self.search(target, i, j2, w2, h2r, best)?;
        self.search(target, i2, j, w2r, h2, best)?;
        self.search(target, i2, j2, w2r, h2r, best)?;
        Ok(())
    }

    /// Whether the quad spanned by `samples` may hold the closest pixel.
    ///
    /// A target near the meridian is also tried one turn the other way, so
    /// 180 and -180 land in the same quads.
    fn admits(&self, samples: &[GeoPos; 4], target: GeoPos) -> bool {
        let inside = |lon: f64| self.quad_box(samples, lon).contains(lon, target.lat);
        if inside(target.lon) {
            return true;
        }
        let wrapped = if target.lon > 0.0 {
            target.lon - 360.0
        } else {
            target.lon + 360.0
        };
        wrapped.abs() <= 180.0 + QUAD_TREE_EPS && inside(wrapped)
    }

    fn quad_box(&self, samples: &[GeoPos; 4], target_lon: f64) -> BoundingBox {
        let lats = [samples[0].lat, samples[1].lat, samples[2].lat, samples[3].lat];
        let lons = [samples[0].lon, samples[1].lon, samples[2].lon, samples[3].lon];
        let (lat_min, lat_max) = min_max(&lats);

        let (lon_min, lon_max) = if is_crossing_meridian_inside_quad(self.crossing, &lons) {
            if target_lon > 0.0 {
                (positive_lon_min(&lons) - QUAD_TREE_EPS, 180.0)
            } else {
                (-180.0, negative_lon_max(&lons) + QUAD_TREE_EPS)
            }
        } else {
            let (lo, hi) = min_max(&lons);
            (lo - QUAD_TREE_EPS, hi + QUAD_TREE_EPS)
        };

        BoundingBox::new(
            lon_min,
            lat_min - QUAD_TREE_EPS,
            lon_max,
            lat_max + QUAD_TREE_EPS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{CoordinateBands, InMemoryCoordinateRaster};

    fn raster(w: usize, h: usize, f: impl Fn(usize, usize) -> (f64, f64)) -> InMemoryCoordinateRaster {
        let mut lat = Vec::new();
        let mut lon = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let (la, lo) = f(x, y);
                lat.push(la as f32);
                lon.push(lo as f32);
            }
        }
        let bands = CoordinateBands::from_arrays(w, h, lat, lon).unwrap();
        InMemoryCoordinateRaster::new(&bands, None).unwrap()
    }

    #[test]
    fn test_finds_exact_sample() {
        let r = raster(17, 11, |x, y| (40.0 + y as f64 * 0.1, -3.0 + x as f64 * 0.1));
        let search = QuadTreeSearch::new(&r, false);
        let pixel = search.find(GeoPos::new(40.5, -2.3)).unwrap();
        assert_eq!(pixel, PixelPos::new(7.5, 5.5));
    }

    #[test]
    fn test_out_of_coverage_is_invalid() {
        let r = raster(8, 8, |x, y| (y as f64, x as f64));
        let search = QuadTreeSearch::new(&r, false);
        assert!(!search.find(GeoPos::new(30.0, 3.0)).unwrap().is_valid());
        assert!(!search.find(GeoPos::invalid()).unwrap().is_valid());
    }

    #[test]
    fn test_odd_sizes_cover_every_pixel() {
        let r = raster(5, 3, |x, y| (y as f64, x as f64));
        let search = QuadTreeSearch::new(&r, false);
        for y in 0..3 {
            for x in 0..5 {
                let best = search
                    .find_best(GeoPos::new(y as f64, x as f64))
                    .unwrap()
                    .unwrap();
                assert_eq!((best.x, best.y), (x, y));
                assert_eq!(best.distance, 0.0);
            }
        }
    }

    #[test]
    fn test_crossing_quad_uses_target_side() {
        let r = raster(8, 4, |x, y| {
            let lon = 179.65 + x as f64 * 0.1;
            (y as f64 * 0.1, if lon > 180.0 { lon - 360.0 } else { lon })
        });
        let search = QuadTreeSearch::new(&r, true);
        let east = search.find_best(GeoPos::new(0.1, 179.95)).unwrap().unwrap();
        assert_eq!((east.x, east.y), (3, 1));
        let west = search.find_best(GeoPos::new(0.1, -179.95)).unwrap().unwrap();
        assert_eq!((west.x, west.y), (4, 1));
    }

    /// Longitudes `start + x / 100` wrapped into [-180, 180), so 180 itself is
    /// stored as -180 when `negative_meridian` is set.
    fn meridian_raster(w: usize, start: i64, negative_meridian: bool) -> InMemoryCoordinateRaster {
        raster(w, 2, |x, y| {
            let hundredths = start + x as i64;
            let mut lon = hundredths as f64 / 100.0;
            if lon > 180.0 || (negative_meridian && lon == 180.0) {
                lon -= 360.0;
            }
            (y as f64 * 0.01, lon)
        })
    }

    #[test]
    fn test_crossing_quad_box_is_padded() {
        // Columns 179.97, 179.98, 179.99, 180.0, -179.99, -179.98, -179.97.
        // The quad over columns 3..4 straddles the meridian; the target sits
        // just east of its -179.99 corner, which is still the closest sample.
        let r = meridian_raster(7, 17997, false);
        let search = QuadTreeSearch::new(&r, true);
        let best = search
            .find_best(GeoPos::new(0.0, -179.9851))
            .unwrap()
            .unwrap();
        assert_eq!((best.x, best.y), (4, 0));

        // Mirror case on the positive side of the same quad.
        let best = search.find_best(GeoPos::new(0.0, 179.9951)).unwrap().unwrap();
        assert_eq!((best.x, best.y), (3, 0));
    }

    #[test]
    fn test_both_meridian_spellings_find_the_same_sample() {
        for negative in [false, true] {
            // Columns 179.95 .. 179.99, then the meridian at x = 5, then -179.99.
            let r = meridian_raster(7, 17995, negative);
            let search = QuadTreeSearch::new(&r, true);
            for lon in [180.0, -180.0, 179.998, -179.998] {
                let best = search.find_best(GeoPos::new(0.01, lon)).unwrap().unwrap();
                assert_eq!((best.x, best.y), (5, 1), "target lon {lon}");
            }
        }
    }

    #[test]
    fn test_raster_touching_the_meridian() {
        let r = raster(6, 4, |x, y| (y as f64, -180.0 + x as f64 * 0.01));
        let search = QuadTreeSearch::new(&r, false);
        for lon in [-180.0, 180.0, 179.999] {
            let best = search.find_best(GeoPos::new(1.0, lon)).unwrap().unwrap();
            assert_eq!((best.x, best.y), (0, 1), "target lon {lon}");
        }
        assert!(search.find_best(GeoPos::new(1.0, 179.9)).unwrap().is_none());
    }
}
