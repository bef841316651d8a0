//! Shared test utilities for the pixel-geocoding workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic swath generators (latitude/longitude planes, validity masks)
//! - Named scene fixtures
//! - Approximate-equality assertion macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{create_swath, scenes};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of coordinate pairs.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!((1.0001, 2.0001), (1.0, 2.0), 0.001);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}

/// Macro asserting that a pixel position lies within `tolerance` pixels of
/// the expected one on both axes.
///
/// Works with any value exposing `x` and `y` fields.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_pixel_near;
///
/// assert_pixel_near!(pixel, (12.5, 3.5), 0.1);
/// ```
#[macro_export]
macro_rules! assert_pixel_near {
    ($pixel:expr, ($x:expr, $y:expr), $tolerance:expr) => {{
        let pixel = $pixel;
        let (x, y): (f64, f64) = ($x as f64, $y as f64);
        let tolerance: f64 = $tolerance as f64;
        if !((pixel.x - x).abs() <= tolerance && (pixel.y - y).abs() <= tolerance) {
            panic!(
                "pixel ({:?}, {:?}) is not within {:?} of ({:?}, {:?})",
                pixel.x, pixel.y, tolerance, x, y
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_coords_approx_eq_passes() {
        assert_coords_approx_eq!((1.0001, 2.0001), (1.0, 2.0), 0.001);
    }

    struct Pixel {
        x: f64,
        y: f64,
    }

    #[test]
    fn test_assert_pixel_near_passes() {
        assert_pixel_near!(Pixel { x: 1.55, y: 1.45 }, (1.5, 1.5), 0.1);
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_assert_pixel_near_fails() {
        assert_pixel_near!(Pixel { x: 2.5, y: 1.5 }, (1.5, 1.5), 0.1);
    }
}
