//! Affine estimator for rasters whose coordinates vary linearly with pixel
//! position.

use nalgebra::Matrix3;

use super::Estimator;
use crate::antimeridian::normalize_lon;
use crate::error::{GeoCodingError, Result};
use crate::types::{GeoPos, PixelPos};

/// `lon = a*x + b*y + c`, `lat = d*x + e*y + f` for pixel position `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineEstimator {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl AffineEstimator {
    /// Build from coefficients `[a, b, c, d, e, f]`. Singular transforms are
    /// rejected.
    pub fn new(coefficients: [f64; 6]) -> Result<Self> {
        let [a, b, c, d, e, f] = coefficients;
        let forward = Matrix3::new(a, b, c, d, e, f, 0.0, 0.0, 1.0);
        let det = a * e - b * d;
        if det.abs() < f64::EPSILON {
            return Err(GeoCodingError::estimator_error(
                "singular affine transform (determinant is zero)",
            ));
        }
        let inverse = forward.try_inverse().ok_or_else(|| {
            GeoCodingError::estimator_error("affine transform cannot be inverted")
        })?;
        Ok(Self { forward, inverse })
    }

    /// Fit the transform exactly through three pixel/geo pairs.
    pub fn from_control_points(points: [(PixelPos, GeoPos); 3]) -> Result<Self> {
        let pixels = Matrix3::from_fn(|r, c| match c {
            0 => points[r].0.x,
            1 => points[r].0.y,
            _ => 1.0,
        });
        let inv = pixels.try_inverse().ok_or_else(|| {
            GeoCodingError::estimator_error("control points are collinear")
        })?;
        let lon = inv * nalgebra::Vector3::new(points[0].1.lon, points[1].1.lon, points[2].1.lon);
        let lat = inv * nalgebra::Vector3::new(points[0].1.lat, points[1].1.lat, points[2].1.lat);
        Self::new([lon[0], lon[1], lon[2], lat[0], lat[1], lat[2]])
    }

    /// The coefficients `[a, b, c, d, e, f]`.
    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.forward;
        [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 0)], m[(1, 1)], m[(1, 2)]]
    }
}

impl Estimator for AffineEstimator {
    fn geo_pos(&self, pixel: PixelPos) -> GeoPos {
        if !pixel.is_valid() {
            return GeoPos::invalid();
        }
        let v = self.forward * nalgebra::Vector3::new(pixel.x, pixel.y, 1.0);
        GeoPos::new(v[1], normalize_lon(v[0]))
    }

    fn pixel_pos(&self, geo: GeoPos) -> PixelPos {
        if !geo.is_valid() {
            return PixelPos::invalid();
        }
        let v = self.inverse * nalgebra::Vector3::new(geo.lon, geo.lat, 1.0);
        PixelPos::new(v[0], v[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward() {
        let est = AffineEstimator::new([0.01, 0.0, 20.0, 0.0, 0.01, 10.0]).unwrap();
        let geo = est.geo_pos(PixelPos::new(1.5, 2.5));
        assert!((geo.lon - 20.015).abs() < 1e-12);
        assert!((geo.lat - 10.025).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let est = AffineEstimator::new([0.02, 0.005, -75.0, -0.003, -0.02, 45.0]).unwrap();
        let pixel = PixelPos::new(123.25, 87.75);
        let back = est.pixel_pos(est.geo_pos(pixel));
        assert!((back.x - pixel.x).abs() < 1e-9);
        assert!((back.y - pixel.y).abs() < 1e-9);
    }

    #[test]
    fn test_singular_affine() {
        let err = AffineEstimator::new([0.0; 6]).unwrap_err();
        assert!(matches!(err, GeoCodingError::EstimatorError(_)));
    }

    #[test]
    fn test_from_control_points() {
        let est = AffineEstimator::from_control_points([
            (PixelPos::new(0.0, 0.0), GeoPos::new(10.0, 20.0)),
            (PixelPos::new(100.0, 0.0), GeoPos::new(10.0, 21.0)),
            (PixelPos::new(0.0, 100.0), GeoPos::new(11.0, 20.0)),
        ])
        .unwrap();
        let c = est.coefficients();
        assert!((c[0] - 0.01).abs() < 1e-12);
        assert!((c[4] - 0.01).abs() < 1e-12);
        assert!((c[2] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        let est = AffineEstimator::new([0.01, 0.0, 20.0, 0.0, 0.01, 10.0]).unwrap();
        assert!(!est.geo_pos(PixelPos::invalid()).is_valid());
        assert!(!est.pixel_pos(GeoPos::invalid()).is_valid());
    }
}
