//! Error types for pixel geo-coding.

use thiserror::Error;

/// Errors that can occur while building or querying a pixel geo-coding.
///
/// A geo-position that simply lies outside the raster is not an error; the
/// lookup operations report it as an invalid [`PixelPos`](crate::PixelPos).
#[derive(Error, Debug)]
pub enum GeoCodingError {
    /// Coordinate bands or parameters are unusable (mismatched sizes, a raster
    /// smaller than 2x2, a search radius below 2).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading latitude, longitude or mask samples failed.
    #[error("failed to read coordinate data: {0}")]
    ReadFailed(String),

    /// A pixel access outside the raster.
    #[error("pixel ({x}, {y}) is outside raster bounds {width}x{height}")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An estimator could not be constructed.
    #[error("estimator error: {0}")]
    EstimatorError(String),

    /// A least-squares fit was singular or degenerate.
    #[error("numerically degenerate fit: {0}")]
    NumericalDegeneracy(String),
}

impl GeoCodingError {
    /// Create an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self::OutOfBounds {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a ConfigError.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an EstimatorError.
    pub fn estimator_error(msg: impl Into<String>) -> Self {
        Self::EstimatorError(msg.into())
    }

    /// Create a NumericalDegeneracy error.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::NumericalDegeneracy(msg.into())
    }
}

impl From<std::io::Error> for GeoCodingError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

/// Result type for geo-coding operations.
pub type Result<T> = std::result::Result<T, GeoCodingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_read_failed() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated band");
        let err: GeoCodingError = io.into();
        assert!(matches!(err, GeoCodingError::ReadFailed(_)));
        assert!(err.to_string().contains("truncated band"));
    }

    #[test]
    fn test_out_of_bounds_message() {
        let err = GeoCodingError::out_of_bounds(12, 3, 10, 10);
        assert_eq!(
            err.to_string(),
            "pixel (12, 3) is outside raster bounds 10x10"
        );
    }
}
