//! Test data generators for synthetic latitude/longitude planes.
//!
//! Planes are `Vec<f32>` in row-major order (row 0 first), the layout
//! coordinate bands expect.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fixtures::SwathSpec;

/// Creates the latitude and longitude planes of a swath.
///
/// # Example
///
/// ```
/// use test_utils::{create_swath, scenes};
///
/// let (lat, lon) = create_swath(&scenes::TINY_4X4);
/// assert_eq!(lat.len(), 16);
/// assert_eq!(lat[4], 10.01);  // row 1
/// assert_eq!(lon[1], 20.01);  // col 1
/// ```
pub fn create_swath(spec: &SwathSpec) -> (Vec<f32>, Vec<f32>) {
    let mut lat = Vec::with_capacity(spec.size());
    let mut lon = Vec::with_capacity(spec.size());
    for y in 0..spec.height {
        for x in 0..spec.width {
            let (la, lo) = spec.sample(x, y);
            lat.push(la as f32);
            lon.push(lo as f32);
        }
    }
    (lat, lon)
}

/// Creates planes from an arbitrary `(x, y) -> (lat, lon)` function.
pub fn create_planes_with<F>(width: usize, height: usize, f: F) -> (Vec<f32>, Vec<f32>)
where
    F: Fn(usize, usize) -> (f64, f64),
{
    let mut lat = Vec::with_capacity(width * height);
    let mut lon = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (la, lo) = f(x, y);
            lat.push(la as f32);
            lon.push(lo as f32);
        }
    }
    (lat, lon)
}

/// Creates a validity mask with every `every`-th pixel (in row-major order,
/// starting at `offset`) marked invalid.
pub fn create_gap_mask(width: usize, height: usize, every: usize, offset: usize) -> Vec<bool> {
    let every = every.max(1);
    (0..width * height)
        .map(|i| i < offset || (i - offset) % every != 0)
        .collect()
}

/// Creates a validity mask with an invalid rectangular block.
pub fn create_block_mask(
    width: usize,
    height: usize,
    block: (usize, usize, usize, usize),
) -> Vec<bool> {
    let (bx, by, bw, bh) = block;
    let mut mask = vec![true; width * height];
    for y in by..(by + bh).min(height) {
        for x in bx..(bx + bw).min(width) {
            mask[y * width + x] = false;
        }
    }
    mask
}

/// Overwrites the masked-out pixels of both planes with garbage, the way
/// missing scan lines look in real products.
pub fn corrupt_masked(lat: &mut [f32], lon: &mut [f32], mask: &[bool]) {
    for ((la, lo), valid) in lat.iter_mut().zip(lon.iter_mut()).zip(mask) {
        if !*valid {
            *la = -999.0;
            *lo = -999.0;
        }
    }
}

/// Creates `count` reproducible random pixel positions inside a swath,
/// kept `margin` pixels away from its edges.
pub fn random_pixels(spec: &SwathSpec, count: usize, margin: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (x_hi, y_hi) = (
        spec.width.saturating_sub(margin).max(margin + 1),
        spec.height.saturating_sub(margin).max(margin + 1),
    );
    (0..count)
        .map(|_| (rng.gen_range(margin..x_hi), rng.gen_range(margin..y_hi)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenes;

    #[test]
    fn test_create_swath_layout() {
        let spec = scenes::ODD;
        let (lat, lon) = create_swath(&spec);
        assert_eq!(lat.len(), spec.size());
        assert_eq!(lon.len(), spec.size());

        let (la, lo) = spec.sample(5, 7);
        assert_eq!(lat[7 * spec.width + 5], la as f32);
        assert_eq!(lon[7 * spec.width + 5], lo as f32);
    }

    #[test]
    fn test_create_planes_with() {
        let (lat, lon) = create_planes_with(3, 2, |x, y| (y as f64, x as f64 * 2.0));
        assert_eq!(lat, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(lon, vec![0.0, 2.0, 4.0, 0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_gap_mask() {
        let mask = create_gap_mask(4, 2, 3, 1);
        assert_eq!(mask, vec![true, false, true, true, false, true, true, false]);
    }

    #[test]
    fn test_block_mask_clips() {
        let mask = create_block_mask(4, 3, (2, 1, 5, 5));
        assert_eq!(mask.iter().filter(|v| !**v).count(), 4);
        assert!(!mask[4 + 2]);
        assert!(mask[4 + 1]);
    }

    #[test]
    fn test_corrupt_masked() {
        let (mut lat, mut lon) = create_planes_with(2, 1, |x, _| (x as f64, x as f64));
        corrupt_masked(&mut lat, &mut lon, &[true, false]);
        assert_eq!(lat, vec![0.0, -999.0]);
        assert_eq!(lon, vec![0.0, -999.0]);
    }

    #[test]
    fn test_random_pixels_are_reproducible() {
        let a = random_pixels(&scenes::MID_LATITUDE, 20, 3, 7);
        let b = random_pixels(&scenes::MID_LATITUDE, 20, 3, 7);
        assert_eq!(a, b);
        assert!(a
            .iter()
            .all(|&(x, y)| (3..197).contains(&x) && (3..157).contains(&y)));
    }
}
