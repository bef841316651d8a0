//! Approximate pixel <-> geo mappings used to seed the local search.
//!
//! An estimator is either supplied by the caller (external, shared and never
//! torn down by the geo-coding) or built from a sub-sampled tie-point grid of
//! the coordinate bands (internal, owned by the geo-coding).

mod affine;
pub mod polynomial;
mod tie_point;

pub use affine::AffineEstimator;
pub use tie_point::{TiePointEstimator, TiePointGrid};

use std::sync::Arc;

use crate::antimeridian::lon_diff;
use crate::types::{GeoPos, PixelPos};

/// A coarse bidirectional pixel <-> geo mapping.
///
/// Either direction may answer with the invalid sentinel.
pub trait Estimator: Send + Sync {
    fn geo_pos(&self, pixel: PixelPos) -> GeoPos;

    fn pixel_pos(&self, geo: GeoPos) -> PixelPos;

    fn is_crossing_antimeridian(&self) -> bool {
        false
    }
}

/// The estimator a geo-coding searches with, tagged by ownership.
#[derive(Clone)]
pub enum EstimatorHandle {
    /// Supplied by the caller.
    External(Arc<dyn Estimator>),
    /// Built from the coordinate bands and owned by the geo-coding.
    Internal(Arc<TiePointEstimator>),
}

impl EstimatorHandle {
    pub fn as_estimator(&self) -> &dyn Estimator {
        match self {
            Self::External(estimator) => estimator.as_ref(),
            Self::Internal(estimator) => estimator.as_ref(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl std::fmt::Debug for EstimatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External(_) => f.write_str("EstimatorHandle::External"),
            Self::Internal(e) => f
                .debug_tuple("EstimatorHandle::Internal")
                .field(&e.grid().dimensions())
                .finish(),
        }
    }
}

/// Largest angular distance a window search may accept as a match.
///
/// Twice the distance between the estimated centres of the first two pixels
/// of the top row, with the longitude step scaled by `cos(lat)`. Infinite
/// when the estimator cannot place both pixels.
pub fn convergence_threshold(estimator: &dyn Estimator) -> f64 {
    let p0 = estimator.geo_pos(PixelPos::new(0.5, 0.5));
    let p1 = estimator.geo_pos(PixelPos::new(1.5, 0.5));
    if !p0.is_valid() || !p1.is_valid() {
        return f64::INFINITY;
    }
    let r = p1.lat.to_radians().cos();
    let dlat = (p0.lat - p1.lat).abs();
    let dlon = r * lon_diff(p0.lon, p1.lon);
    2.0 * (dlat * dlat + dlon * dlon).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invalid;

    impl Estimator for Invalid {
        fn geo_pos(&self, _pixel: PixelPos) -> GeoPos {
            GeoPos::invalid()
        }

        fn pixel_pos(&self, _geo: GeoPos) -> PixelPos {
            PixelPos::invalid()
        }
    }

    #[test]
    fn test_threshold_from_affine_estimator() {
        // 0.01 degrees per pixel in both directions.
        let estimator = AffineEstimator::new([0.01, 0.0, 20.0, 0.0, 0.01, 10.0]).unwrap();
        let threshold = convergence_threshold(&estimator);
        let expected = 2.0 * 0.01 * (10.005f64).to_radians().cos();
        assert!((threshold - expected).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_without_positions_is_infinite() {
        assert!(convergence_threshold(&Invalid).is_infinite());
    }

    #[test]
    fn test_handle_reports_ownership() {
        let external: Arc<dyn Estimator> = Arc::new(Invalid);
        let handle = EstimatorHandle::External(Arc::clone(&external));
        assert!(!handle.is_internal());
        assert!(!handle.as_estimator().geo_pos(PixelPos::new(0.5, 0.5)).is_valid());
    }
}
