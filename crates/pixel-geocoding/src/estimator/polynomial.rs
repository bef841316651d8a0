//! Least-squares polynomials `z = Σ c_ij · x^i · y^j` over scattered points.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{GeoCodingError, Result};

/// Polynomial families tried when approximating a tile, in order of cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolynomialKind {
    Linear,
    BiLinear,
    Quadric,
    BiQuadric,
    Cubic,
    BiCubic,
}

impl PolynomialKind {
    /// Candidates in the order they are tried.
    pub const CANDIDATES: [PolynomialKind; 6] = [
        Self::Linear,
        Self::BiLinear,
        Self::Quadric,
        Self::BiQuadric,
        Self::Cubic,
        Self::BiCubic,
    ];

    /// Exponent pairs `(i, j)` of the terms.
    pub fn exponents(self) -> Vec<(i32, i32)> {
        match self {
            Self::Linear => total_degree(1),
            Self::Quadric => total_degree(2),
            Self::Cubic => total_degree(3),
            Self::BiLinear => {
                let mut terms = total_degree(1);
                terms.push((1, 1));
                terms
            }
            Self::BiQuadric => per_axis_degree(2),
            Self::BiCubic => per_axis_degree(3),
        }
    }

    pub fn term_count(self) -> usize {
        self.exponents().len()
    }

    /// Minimum number of points before a fit is attempted.
    pub fn required_points(self) -> usize {
        match self {
            Self::Linear | Self::Quadric | Self::Cubic => self.term_count(),
            Self::BiLinear | Self::BiQuadric | Self::BiCubic => 2 * self.term_count(),
        }
    }
}

fn total_degree(order: i32) -> Vec<(i32, i32)> {
    let mut terms = Vec::new();
    for n in 0..=order {
        for j in 0..=n {
            terms.push((n - j, j));
        }
    }
    terms
}

fn per_axis_degree(order: i32) -> Vec<(i32, i32)> {
    let mut terms = Vec::new();
    for j in 0..=order {
        for i in 0..=order {
            terms.push((i, j));
        }
    }
    terms
}

/// A fitted polynomial with its residual statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    kind: PolynomialKind,
    exponents: Vec<(i32, i32)>,
    coefficients: Vec<f64>,
    rmse: f64,
    max_error: f64,
}

impl Polynomial {
    /// Least-squares fit of `kind` through `(x, y, z)` points.
    ///
    /// Fails with [`GeoCodingError::NumericalDegeneracy`] if the design
    /// matrix is rank deficient.
    pub fn fit(kind: PolynomialKind, points: &[(f64, f64, f64)]) -> Result<Self> {
        let exponents = kind.exponents();
        let terms = exponents.len();
        if points.len() < terms {
            return Err(GeoCodingError::degenerate(format!(
                "{:?} needs {} points, got {}",
                kind,
                terms,
                points.len()
            )));
        }

        let design = DMatrix::from_fn(points.len(), terms, |row, col| {
            let (x, y, _) = points[row];
            let (i, j) = exponents[col];
            x.powi(i) * y.powi(j)
        });
        let rhs = DVector::from_iterator(points.len(), points.iter().map(|p| p.2));

        let svd = design.svd(true, true);
        let largest = svd.singular_values.max();
        if !largest.is_finite() || largest == 0.0 {
            return Err(GeoCodingError::degenerate(format!("{:?}: empty design", kind)));
        }
        let tolerance = largest * 1e-10 * points.len().max(terms) as f64;
        if svd.rank(tolerance) < terms {
            return Err(GeoCodingError::degenerate(format!(
                "{:?}: design matrix is rank deficient",
                kind
            )));
        }
        let solution = svd
            .solve(&rhs, tolerance)
            .map_err(|e| GeoCodingError::degenerate(format!("{:?}: {}", kind, e)))?;

        let mut polynomial = Self {
            kind,
            exponents,
            coefficients: solution.iter().copied().collect(),
            rmse: 0.0,
            max_error: 0.0,
        };

        let mut sum_sq = 0.0;
        let mut max_error: f64 = 0.0;
        for &(x, y, z) in points {
            let err = (polynomial.evaluate(x, y) - z).abs();
            sum_sq += err * err;
            max_error = max_error.max(err);
        }
        polynomial.rmse = (sum_sq / points.len() as f64).sqrt();
        polynomial.max_error = max_error;
        Ok(polynomial)
    }

    /// Pick the cheapest candidate whose maximum error is below
    /// `error_limit`, otherwise the one with the lowest RMSE. Candidates that
    /// lack points or fit degenerately are skipped.
    pub fn best_fit(points: &[(f64, f64, f64)], error_limit: f64) -> Option<Self> {
        let mut best: Option<Self> = None;
        for kind in PolynomialKind::CANDIDATES {
            if points.len() < kind.required_points() {
                continue;
            }
            let candidate = match Self::fit(kind, points) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "skipping polynomial");
                    continue;
                }
            };
            if candidate.max_error < error_limit {
                return Some(candidate);
            }
            let better = best.as_ref().map_or(true, |b| candidate.rmse < b.rmse);
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.exponents
            .iter()
            .zip(&self.coefficients)
            .map(|(&(i, j), c)| c * x.powi(i) * y.powi(j))
            .sum()
    }

    pub fn kind(&self) -> PolynomialKind {
        self.kind
    }

    pub fn rmse(&self) -> f64 {
        self.rmse
    }

    pub fn max_error(&self) -> f64 {
        self.max_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points(f: impl Fn(f64, f64) -> f64) -> Vec<(f64, f64, f64)> {
        let mut points = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                let x = i as f64 * 0.1;
                let y = j as f64 * 0.1 - 0.2;
                points.push((x, y, f(x, y)));
            }
        }
        points
    }

    #[test]
    fn test_term_counts() {
        assert_eq!(PolynomialKind::Linear.term_count(), 3);
        assert_eq!(PolynomialKind::BiLinear.term_count(), 4);
        assert_eq!(PolynomialKind::Quadric.term_count(), 6);
        assert_eq!(PolynomialKind::BiQuadric.term_count(), 9);
        assert_eq!(PolynomialKind::Cubic.term_count(), 10);
        assert_eq!(PolynomialKind::BiCubic.term_count(), 16);
        assert_eq!(PolynomialKind::BiLinear.required_points(), 8);
    }

    #[test]
    fn test_linear_fit_is_exact() {
        let points = grid_points(|x, y| 3.0 + 2.0 * x - 5.0 * y);
        let p = Polynomial::fit(PolynomialKind::Linear, &points).unwrap();
        assert!(p.max_error() < 1e-9);
        assert!((p.evaluate(0.25, 0.05) - (3.0 + 0.5 - 0.25)).abs() < 1e-9);
    }

    #[test]
    fn test_best_fit_stops_at_first_sufficient_candidate() {
        let points = grid_points(|x, y| 1.0 + x * y);
        let p = Polynomial::best_fit(&points, 1e-6).unwrap();
        assert_eq!(p.kind(), PolynomialKind::BiLinear);
    }

    #[test]
    fn test_best_fit_falls_back_to_lowest_rmse() {
        let points = grid_points(|x, y| (5.0 * x).sin() * (3.0 * y).exp());
        let p = Polynomial::best_fit(&points, 1e-12).unwrap();
        for kind in PolynomialKind::CANDIDATES {
            if let Ok(other) = Polynomial::fit(kind, &points) {
                assert!(p.rmse() <= other.rmse() + 1e-15);
            }
        }
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let points: Vec<_> = (0..10).map(|i| (i as f64, i as f64, i as f64)).collect();
        let err = Polynomial::fit(PolynomialKind::Linear, &points).unwrap_err();
        assert!(matches!(err, GeoCodingError::NumericalDegeneracy(_)));
        assert!(Polynomial::best_fit(&points, 0.5).is_none());
    }
}
