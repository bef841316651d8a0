//! Common scene definitions for geo-coding tests.
//!
//! Each [`SwathSpec`] describes a synthetic swath: a regular lat/lon lattice,
//! optionally rotated about its first pixel. The generators in
//! [`crate::generators`] turn a swath description into latitude and longitude planes.

/// Synthetic swath description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwathSpec {
    pub width: usize,
    pub height: usize,
    /// Latitude of pixel (0, 0).
    pub lat0: f64,
    /// Longitude of pixel (0, 0).
    pub lon0: f64,
    /// Degrees per pixel.
    pub step: f64,
    /// Clockwise rotation of the lattice in degrees.
    pub rotation: f64,
}

impl SwathSpec {
    pub const fn new(width: usize, height: usize, lat0: f64, lon0: f64, step: f64) -> Self {
        Self {
            width,
            height,
            lat0,
            lon0,
            step,
            rotation: 0.0,
        }
    }

    pub const fn rotated(self, rotation: f64) -> Self {
        Self { rotation, ..self }
    }

    /// Returns the total number of pixels.
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    /// Unnormalized coordinates of a fractional pixel position, as
    /// `(lat, lon)`. Pixel `(x, y)` has its sample at `(x, y)`, not at the
    /// centre.
    pub fn lat_lon(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let lon = self.lon0 + self.step * (x * cos - y * sin);
        let lat = self.lat0 + self.step * (x * sin + y * cos);
        (lat, lon)
    }

    /// Coordinates of pixel `(x, y)` with the longitude wrapped into
    /// [-180, 180].
    pub fn sample(&self, x: usize, y: usize) -> (f64, f64) {
        let (lat, lon) = self.lat_lon(x as f64, y as f64);
        (lat, wrap_lon(lon))
    }
}

/// Wrap a longitude into [-180, 180].
pub fn wrap_lon(mut lon: f64) -> f64 {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

/// Named scenes.
pub mod scenes {
    use super::SwathSpec;

    /// Four by four pixels, 0.01 degree apart, starting at (10, 20).
    pub const TINY_4X4: SwathSpec = SwathSpec::new(4, 4, 10.0, 20.0, 0.01);

    /// Mid-latitude swath large enough for an internal tie-point estimator.
    pub const MID_LATITUDE: SwathSpec = SwathSpec::new(200, 160, 45.0, 5.0, 0.01);

    /// Same lattice as [`MID_LATITUDE`], tilted like an inclined orbit.
    pub const ROTATED: SwathSpec = SwathSpec::new(200, 160, 45.0, 5.0, 0.01).rotated(12.0);

    /// Swath whose longitudes run from 179.5 across the antimeridian.
    pub const ANTIMERIDIAN: SwathSpec = SwathSpec::new(100, 60, -10.0, 179.5, 0.01);

    /// Small swath near the equator.
    pub const EQUATORIAL: SwathSpec = SwathSpec::new(64, 64, -0.3, 30.0, 0.01);

    /// High-latitude swath.
    pub const POLAR: SwathSpec = SwathSpec::new(120, 90, 80.0, -40.0, 0.02);

    /// Odd-sized swath that exercises partial tiles and quads.
    pub const ODD: SwathSpec = SwathSpec::new(37, 23, -33.0, 151.0, 0.05);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_size() {
        assert_eq!(scenes::TINY_4X4.size(), 16);
        assert_eq!(scenes::MID_LATITUDE.size(), 32_000);
    }

    #[test]
    fn test_unrotated_lattice() {
        let (lat, lon) = scenes::TINY_4X4.lat_lon(3.0, 2.0);
        assert!((lat - 10.02).abs() < 1e-12);
        assert!((lon - 20.03).abs() < 1e-12);
    }

    #[test]
    fn test_antimeridian_samples_wrap() {
        let (_, lon) = scenes::ANTIMERIDIAN.sample(80, 0);
        assert!((lon - (-179.7)).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_lon_keeps_bounds() {
        assert_eq!(wrap_lon(180.0), 180.0);
        assert_eq!(wrap_lon(-180.0), -180.0);
        assert!((wrap_lon(190.0) + 170.0).abs() < 1e-12);
    }
}
