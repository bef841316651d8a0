//! Estimator-seeded local window search.

use tracing::{debug, trace};

use super::quad_tree::{square_distance, QuadTreeSearch};
use crate::error::{GeoCodingError, Result};
use crate::estimator::Estimator;
use crate::raster::CoordinateRaster;
use crate::types::{GeoPos, PixelPos, PixelRect};

/// Upper bound on window re-centerings per lookup.
pub const MAX_SEARCH_CYCLES: usize = 10;

/// Progress of one window search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    pub x: usize,
    pub y: usize,
    /// Squared angular distance of `(x, y)` to the target.
    pub min_delta: f64,
    pub cycles: usize,
}

/// Refines an estimator's guess by scanning a square window around it and
/// re-centering while the best pixel keeps landing near the window edge.
pub struct LocalWindowSearch<'a> {
    raster: &'a dyn CoordinateRaster,
    estimator: &'a dyn Estimator,
    radius: usize,
    threshold: f64,
    fallback: QuadTreeSearch<'a>,
}

impl<'a> LocalWindowSearch<'a> {
    /// `threshold` is the largest accepted angular distance; `fallback`
    /// answers when the estimator has no usable guess.
    pub fn new(
        raster: &'a dyn CoordinateRaster,
        estimator: &'a dyn Estimator,
        radius: usize,
        threshold: f64,
        fallback: QuadTreeSearch<'a>,
    ) -> Self {
        Self {
            raster,
            estimator,
            radius,
            threshold,
            fallback,
        }
    }

    pub fn find(&self, target: GeoPos) -> Result<PixelPos> {
        if !target.is_valid() {
            return Ok(PixelPos::invalid());
        }
        let guess = self.estimator.pixel_pos(target);
        let Some((x0, y0)) = guess.floor_within(self.raster.width(), self.raster.height()) else {
            debug!(?target, ?guess, "estimator guess unusable, falling back to quad tree");
            return self.fallback.find(target);
        };

        let state = self.refine(target, x0, y0)?;
        trace!(?target, ?state, "window search finished");
        if state.min_delta.sqrt() < self.threshold {
            Ok(PixelPos::new(state.x as f64 + 0.5, state.y as f64 + 0.5))
        } else {
            Ok(PixelPos::invalid())
        }
    }

    /// Run the re-centering loop from pixel `(x0, y0)`, which must lie inside
    /// the raster.
    pub fn refine(&self, target: GeoPos, x0: usize, y0: usize) -> Result<SearchState> {
        let (width, height) = (self.raster.width(), self.raster.height());
        if x0 >= width || y0 >= height {
            return Err(GeoCodingError::out_of_bounds(x0, y0, width, height));
        }
        let mut state = SearchState {
            x: x0,
            y: y0,
            min_delta: f64::INFINITY,
            cycles: 0,
        };
        let border = self.radius.saturating_sub(2);

        loop {
            let (cx, cy) = (state.x, state.y);
            let (bx, by, delta) = self.best_in_window(target, cx, cy)?;
            state.x = bx;
            state.y = by;
            state.min_delta = delta;
            state.cycles += 1;

            let moved = (bx, by) != (cx, cy);
            let on_border = bx.abs_diff(cx) > border || by.abs_diff(cy) > border;
            if state.cycles >= MAX_SEARCH_CYCLES || !moved || !on_border {
                return Ok(state);
            }
        }
    }

    /// Closest pixel in the window centred on `(cx, cy)`. The centre's own
    /// distance is the starting minimum; exact ties go to the candidate
    /// farther from the centre.
    fn best_in_window(&self, target: GeoPos, cx: usize, cy: usize) -> Result<(usize, usize, f64)> {
        let rect = PixelRect::centered(cx, cy, self.radius);
        let block = self.raster.sample_rect(&rect)?;
        let r = target.lat.to_radians().cos();

        let (mut bx, mut by) = (cx, cy);
        let mut min_delta = square_distance(target, r, block.get(cx, cy));
        let manhattan = |x: usize, y: usize| x.abs_diff(cx) + y.abs_diff(cy);

        let clipped = block.rect;
        for y in clipped.y as usize..clipped.bottom() as usize {
            for x in clipped.x as usize..clipped.right() as usize {
                if x == cx && y == cy {
                    continue;
                }
                let delta = square_distance(target, r, block.get(x, y));
                if delta < min_delta
                    || (delta == min_delta && manhattan(x, y) > manhattan(bx, by))
                {
                    min_delta = delta;
                    bx = x;
                    by = y;
                }
            }
        }
        Ok((bx, by, min_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::AffineEstimator;
    use crate::raster::{CoordinateBands, InMemoryCoordinateRaster};

    fn linear(w: usize, h: usize) -> InMemoryCoordinateRaster {
        let mut lat = Vec::new();
        let mut lon = Vec::new();
        for y in 0..h {
            for x in 0..w {
                lat.push((10.0 + y as f64 * 0.01) as f32);
                lon.push((20.0 + x as f64 * 0.01) as f32);
            }
        }
        InMemoryCoordinateRaster::new(&CoordinateBands::from_arrays(w, h, lat, lon).unwrap(), None)
            .unwrap()
    }

    /// Estimator that is off by a fixed pixel offset.
    fn shifted_estimator(dx: f64, dy: f64) -> AffineEstimator {
        AffineEstimator::new([0.01, 0.0, 19.995 - dx * 0.01, 0.0, 0.01, 9.995 - dy * 0.01])
            .unwrap()
    }

    #[test]
    fn test_exact_guess_converges_in_one_cycle() {
        let raster = linear(60, 60);
        let est = shifted_estimator(0.0, 0.0);
        let search = LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        let state = search.refine(GeoPos::new(10.3, 20.4), 40, 30).unwrap();
        assert_eq!((state.x, state.y), (40, 30));
        assert_eq!(state.cycles, 1);
    }

    #[test]
    fn test_far_guess_walks_to_target() {
        let raster = linear(60, 60);
        let est = shifted_estimator(0.0, 0.0);
        let search = LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        let state = search.refine(GeoPos::new(10.3, 20.4), 20, 20).unwrap();
        assert_eq!((state.x, state.y), (40, 30));
        assert!(state.cycles > 1);
        assert!(state.cycles <= MAX_SEARCH_CYCLES);
    }

    #[test]
    fn test_cycles_are_bounded() {
        let raster = linear(200, 200);
        let est = shifted_estimator(0.0, 0.0);
        let search = LocalWindowSearch::new(&raster, &est, 2, 0.02, QuadTreeSearch::new(&raster, false));
        // Each cycle can move at most two pixels.
        let state = search.refine(GeoPos::new(11.5, 21.5), 0, 0).unwrap();
        assert_eq!(state.cycles, MAX_SEARCH_CYCLES);
        assert_eq!((state.x, state.y), (20, 20));
    }

    #[test]
    fn test_find_accepts_below_threshold() {
        let raster = linear(60, 60);
        let est = shifted_estimator(3.0, -2.0);
        let search = LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        let pixel = search.find(GeoPos::new(10.3, 20.4)).unwrap();
        assert_eq!(pixel, PixelPos::new(40.5, 30.5));
    }

    #[test]
    fn test_find_rejects_beyond_threshold() {
        let raster = linear(60, 60);
        let est = shifted_estimator(0.0, 0.0);
        // Halfway between four pixels.
        let target = GeoPos::new(10.305, 20.405);

        let strict =
            LocalWindowSearch::new(&raster, &est, 5, 1e-6, QuadTreeSearch::new(&raster, false));
        assert!(!strict.find(target).unwrap().is_valid());

        let loose =
            LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        assert!(loose.find(target).unwrap().is_valid());
    }

    #[test]
    fn test_unusable_guess_uses_quad_tree() {
        let raster = linear(30, 30);
        // Guesses land far left of the raster.
        let est = shifted_estimator(500.0, 0.0);
        let search = LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        let pixel = search.find(GeoPos::new(10.1, 20.2)).unwrap();
        assert_eq!(pixel, PixelPos::new(20.5, 10.5));
    }

    #[test]
    fn test_refine_rejects_start_outside_raster() {
        let raster = linear(30, 20);
        let est = shifted_estimator(0.0, 0.0);
        let search = LocalWindowSearch::new(&raster, &est, 5, 0.02, QuadTreeSearch::new(&raster, false));
        let err = search.refine(GeoPos::new(10.1, 20.1), 30, 5).unwrap_err();
        assert!(matches!(
            err,
            GeoCodingError::OutOfBounds { x: 30, y: 5, width: 30, height: 20 }
        ));
        assert!(search.refine(GeoPos::new(10.1, 20.1), 3, 20).is_err());
        assert!(search.refine(GeoPos::new(10.1, 20.1), 29, 19).is_ok());
    }

    /// 11 x 11 raster far from the target except at `hits`, which hold the
    /// target's exact coordinates.
    fn raster_with_hits(hits: &[(usize, usize)]) -> (InMemoryCoordinateRaster, GeoPos) {
        let (lat, lon) = (10.0f32, 20.0f32);
        let mut lats = vec![50.0f32; 121];
        let mut lons = vec![50.0f32; 121];
        for &(x, y) in hits {
            lats[y * 11 + x] = lat;
            lons[y * 11 + x] = lon;
        }
        let bands = CoordinateBands::from_arrays(11, 11, lats, lons).unwrap();
        let raster = InMemoryCoordinateRaster::new(&bands, None).unwrap();
        (raster, GeoPos::new(lat as f64, lon as f64))
    }

    #[test]
    fn test_ties_go_to_the_farther_pixel() {
        let est = shifted_estimator(0.0, 0.0);

        // (5, 4) is scanned first but sits next to the centre.
        let (raster, target) = raster_with_hits(&[(5, 4), (6, 6)]);
        let search = LocalWindowSearch::new(&raster, &est, 2, 0.02, QuadTreeSearch::new(&raster, false));
        assert_eq!(search.best_in_window(target, 5, 5).unwrap(), (6, 6, 0.0));

        // A later, nearer tie does not displace the farther one.
        let (raster, target) = raster_with_hits(&[(3, 3), (5, 6)]);
        let search = LocalWindowSearch::new(&raster, &est, 2, 0.02, QuadTreeSearch::new(&raster, false));
        assert_eq!(search.best_in_window(target, 5, 5).unwrap(), (3, 3, 0.0));

        // The centre itself loses a tie against any other pixel.
        let (raster, target) = raster_with_hits(&[(5, 5), (7, 5)]);
        let search = LocalWindowSearch::new(&raster, &est, 2, 0.02, QuadTreeSearch::new(&raster, false));
        assert_eq!(search.best_in_window(target, 5, 5).unwrap(), (7, 5, 0.0));
    }
}
