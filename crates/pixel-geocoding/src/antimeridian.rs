//! Longitude arithmetic around the ±180° meridian.
//!
//! Longitudes are compared by their shortest angular difference, quads that
//! straddle the antimeridian get a one-sided longitude range, and a raster's
//! boundary is walked once to decide whether it crosses the antimeridian at
//! all.

/// Absolute angular difference between two longitudes, in `[0, 180]`.
pub fn lon_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Signed difference `a - b` wrapped into `(-180, 180]`.
pub fn signed_lon_diff(a: f64, b: f64) -> f64 {
    let mut d = a - b;
    if !d.is_finite() {
        return d;
    }
    while d > 180.0 {
        d -= 360.0;
    }
    while d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Wrap a longitude into `[-180, 180]`. Values already in range are kept
/// unchanged, so both 180 and -180 survive.
pub fn normalize_lon(lon: f64) -> f64 {
    if !lon.is_finite() {
        return lon;
    }
    let mut lon = lon;
    while lon < -180.0 {
        lon += 360.0;
    }
    while lon > 180.0 {
        lon -= 360.0;
    }
    lon
}

/// Whether a quad with the given corner longitudes straddles the
/// antimeridian. Only possible when the raster as a whole crosses it.
pub fn is_crossing_meridian_inside_quad(raster_crosses: bool, lons: &[f64; 4]) -> bool {
    if !raster_crosses {
        return false;
    }
    let (min, max) = min_max(lons);
    (max - min).abs() > 180.0
}

/// Smallest non-negative corner longitude, or 180 if there is none.
pub fn positive_lon_min(lons: &[f64; 4]) -> f64 {
    lons.iter()
        .copied()
        .filter(|lon| *lon >= 0.0)
        .fold(180.0, f64::min)
}

/// Largest negative corner longitude, or -180 if there is none.
pub fn negative_lon_max(lons: &[f64; 4]) -> f64 {
    lons.iter()
        .copied()
        .filter(|lon| *lon < 0.0)
        .fold(-180.0, f64::max)
}

/// Minimum and maximum of four corner values.
pub fn min_max(values: &[f64; 4]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Bilinear longitude interpolation that follows the short way around.
///
/// Corners are unwrapped relative to `lon00` before weighting, so a cell
/// spanning 179.8 .. -179.8 interpolates through 180 rather than through 0.
/// Weights outside `[0, 1]` extrapolate.
pub fn interpolate_lon(wx: f64, wy: f64, lon00: f64, lon10: f64, lon01: f64, lon11: f64) -> f64 {
    let d10 = lon00 + signed_lon_diff(lon10, lon00);
    let d01 = lon00 + signed_lon_diff(lon01, lon00);
    let d11 = lon00 + signed_lon_diff(lon11, lon00);
    let top = lon00 + wx * (d10 - lon00);
    let bottom = d01 + wx * (d11 - d01);
    normalize_lon(top + wy * (bottom - top))
}

/// Plain bilinear interpolation of four corner values.
pub fn interpolate(wx: f64, wy: f64, v00: f64, v10: f64, v01: f64, v11: f64) -> f64 {
    let top = v00 + wx * (v10 - v00);
    let bottom = v01 + wx * (v11 - v01);
    top + wy * (bottom - top)
}

/// Closed clockwise walk over the outer pixels of a `width x height` raster.
///
/// Starts at `(0, 0)`, runs along the top edge, down the right edge, back
/// along the bottom edge and up the left edge, visiting every `step`-th
/// pixel plus all four corners, and ends where it started.
pub fn pixel_boundary(width: usize, height: usize, step: usize) -> Vec<(usize, usize)> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let step = step.max(1);
    let x_last = width - 1;
    let y_last = height - 1;
    let mut points = Vec::with_capacity(2 * (width + height) / step + 5);

    for x in (0..x_last).step_by(step) {
        points.push((x, 0));
    }
    for y in (0..y_last).step_by(step) {
        points.push((x_last, y));
    }
    for x in (1..=x_last).rev().step_by(step) {
        points.push((x, y_last));
    }
    for y in (1..=y_last).rev().step_by(step) {
        points.push((0, y));
    }
    points.push((0, 0));
    points
}

/// True if any two consecutive longitudes jump by more than 180°.
///
/// NaN samples never count as a jump.
pub fn crosses_antimeridian<I>(lons: I) -> bool
where
    I: IntoIterator<Item = f64>,
{
    let mut prev: Option<f64> = None;
    for lon in lons {
        if lon.is_nan() {
            continue;
        }
        if let Some(p) = prev {
            if (lon - p).abs() > 180.0 {
                return true;
            }
        }
        prev = Some(lon);
    }
    false
}
