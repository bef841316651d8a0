//! Internal estimator built from a sub-sampled tie-point grid.
//!
//! Forward mapping interpolates bilinearly between tie points. Inverse
//! mapping splits the grid into overlapping tiles and fits, per tile, a pair
//! of polynomials `x(lat, lon)` and `y(lat, lon)` in rescaled coordinates.

use tracing::{debug, warn};

use super::polynomial::Polynomial;
use super::Estimator;
use crate::antimeridian::{interpolate, interpolate_lon};
use crate::error::{GeoCodingError, Result};
use crate::raster::CoordinateBands;
use crate::types::{GeoPos, PixelPos, PixelRect};

/// Fits are accepted once every warp point is within half a pixel.
const ABS_ERROR_LIMIT: f64 = 0.5;
const MAX_POINTS_PER_TILE: usize = 1000;
const MIN_POINTS_PER_TILE: usize = 10;

/// A coarse, regular sampling of the latitude and longitude bands.
///
/// Tie point `(i, j)` sits at pixel position
/// `(offset_x + i * sub_x, offset_y + j * sub_y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TiePointGrid {
    width: usize,
    height: usize,
    offset_x: f64,
    offset_y: f64,
    sub_x: f64,
    sub_y: f64,
    lat: Vec<f32>,
    lon: Vec<f32>,
}

impl TiePointGrid {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: usize,
        height: usize,
        offset_x: f64,
        offset_y: f64,
        sub_x: f64,
        sub_y: f64,
        lat: Vec<f32>,
        lon: Vec<f32>,
    ) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(GeoCodingError::invalid_input(format!(
                "tie-point grid must be at least 2x2, got {}x{}",
                width, height
            )));
        }
        if lat.len() != width * height || lon.len() != width * height {
            return Err(GeoCodingError::invalid_input(format!(
                "tie-point grid {}x{} holds {} lat and {} lon values",
                width,
                height,
                lat.len(),
                lon.len()
            )));
        }
        if sub_x <= 0.0 || sub_y <= 0.0 {
            return Err(GeoCodingError::invalid_input("tie-point spacing must be positive"));
        }
        Ok(Self {
            width,
            height,
            offset_x,
            offset_y,
            sub_x,
            sub_y,
            lat,
            lon,
        })
    }

    /// Sample every `step`-th pixel of the bands, centred so the unused
    /// remainder is split between both edges. Rows are read one at a time.
    pub fn from_bands(bands: &CoordinateBands, step: usize) -> Result<Self> {
        let (w, h) = (bands.width(), bands.height());
        let step = step.max(1);
        let tw = w / step;
        let th = h / step;
        let x0 = (w % step) / 2;
        let y0 = (h % step) / 2;

        let mut lat = Vec::with_capacity(tw * th);
        let mut lon = Vec::with_capacity(tw * th);
        for j in 0..th {
            let y = y0 + j * step;
            let row = PixelRect::new(0, y as i64, w as i64, 1);
            let (row_lat, row_lon) = bands.read_lat_lon(&row)?;
            for i in 0..tw {
                let x = x0 + i * step;
                lat.push(row_lat[x]);
                lon.push(row_lon[x]);
            }
        }

        Self::new(
            tw,
            th,
            x0 as f64 + 0.5,
            y0 as f64 + 0.5,
            step as f64,
            step as f64,
            lat,
            lon,
        )
    }

    /// Number of tie points along each axis.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pixel position of tie point `(i, j)`.
    pub fn pixel_of(&self, i: usize, j: usize) -> (f64, f64) {
        (
            self.offset_x + i as f64 * self.sub_x,
            self.offset_y + j as f64 * self.sub_y,
        )
    }

    fn at(&self, values: &[f32], i: usize, j: usize) -> f64 {
        values[j * self.width + i] as f64
    }

    pub fn lat_at(&self, i: usize, j: usize) -> f64 {
        self.at(&self.lat, i, j)
    }

    pub fn lon_at(&self, i: usize, j: usize) -> f64 {
        self.at(&self.lon, i, j)
    }
}

#[derive(Debug, Clone)]
struct Approximation {
    fx: Polynomial,
    fy: Polynomial,
    center_lat: f64,
    center_lon: f64,
    max_square_distance: f64,
}

impl Approximation {
    fn square_distance(&self, lat: f64, lon: f64) -> f64 {
        let dx = lon - self.center_lon;
        let dy = lat - self.center_lat;
        dx * dx + dy * dy
    }

    fn pixel_pos(&self, lat: f64, lon: f64) -> PixelPos {
        let u = rescale_lat(lat);
        let v = rescale_lon(lon, self.center_lon);
        PixelPos::new(self.fx.evaluate(u, v), self.fy.evaluate(u, v))
    }
}

/// Piecewise polynomial inverse over a longitude-unwrapped grid.
#[derive(Debug, Clone)]
struct InverseMapping {
    lon_min: f64,
    lon_max: f64,
    overlap_start: f64,
    overlap_end: f64,
    approximations: Vec<Approximation>,
}

impl InverseMapping {
    fn build(grid: &TiePointGrid, normalized_lon: &[f64]) -> Option<Self> {
        let (lon_min, lon_max) = normalized_lon
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if !lon_min.is_finite() {
            return None;
        }
        let overlap_start = if lon_min < -180.0 { lon_min + 360.0 } else { lon_min };
        let overlap_end = if lon_max > 180.0 { lon_max - 360.0 } else { lon_max };

        let (tiles_i, tiles_j) = tile_layout(grid);
        let rects = subdivide(grid.width, grid.height, tiles_i, tiles_j, 1);
        debug!(
            tiles_i,
            tiles_j,
            lon_min,
            lon_max,
            "building tie-point approximations"
        );

        let mut approximations = Vec::with_capacity(rects.len());
        for rect in &rects {
            match create_approximation(grid, normalized_lon, rect) {
                Some(a) => approximations.push(a),
                None => {
                    warn!(tile = ?rect, "no polynomial fits tie-point tile; inverse mapping disabled");
                    return None;
                }
            }
        }

        Some(Self {
            lon_min,
            lon_max,
            overlap_start,
            overlap_end,
            approximations,
        })
    }

    fn best_approximation(&self, lat: f64, lon: f64) -> Option<&Approximation> {
        let mut best = None;
        let mut min_distance = f64::MAX;
        for a in &self.approximations {
            let d = a.square_distance(lat, lon);
            if d < min_distance && d < a.max_square_distance {
                min_distance = d;
                best = Some(a);
            }
        }
        best
    }

    fn pixel_pos(&self, geo: GeoPos) -> PixelPos {
        let lat = geo.lat;
        if lat.is_nan() || !(-90.0..=90.0).contains(&lat) {
            return PixelPos::invalid();
        }
        if geo.lon.is_nan() || !(-180.0..=180.0).contains(&geo.lon) {
            return PixelPos::invalid();
        }
        let mut lon = geo.lon;
        if lon < self.lon_min {
            lon += 360.0;
        }
        if lon < self.lon_min || lon > self.lon_max {
            return PixelPos::invalid();
        }

        let mut approximation = self.best_approximation(lat, lon);
        // Points in the overlap range may belong to the re-normalized strip.
        if lon >= self.overlap_start && lon <= self.overlap_end {
            let distance = approximation
                .map(|a| a.square_distance(lat, lon))
                .unwrap_or(f64::MAX);
            let shifted = lon + 360.0;
            if let Some(a) = self.best_approximation(lat, shifted) {
                if a.square_distance(lat, shifted) < distance {
                    approximation = Some(a);
                    lon = shifted;
                }
            }
        }

        match approximation {
            Some(a) => a.pixel_pos(lat, lon),
            None => PixelPos::invalid(),
        }
    }
}

/// Estimator over a [`TiePointGrid`].
#[derive(Debug, Clone)]
pub struct TiePointEstimator {
    grid: TiePointGrid,
    raster_width: usize,
    raster_height: usize,
    crossing: bool,
    inverse: Option<InverseMapping>,
}

impl TiePointEstimator {
    /// Build the estimator for a raster of `raster_width x raster_height`
    /// pixels. If no polynomial fits some tile, the estimator keeps its
    /// forward mapping and answers every inverse query with the invalid
    /// sentinel.
    pub fn new(grid: TiePointGrid, raster_width: usize, raster_height: usize) -> Self {
        let (normalized_lon, crossing) = normalize_lon_grid(&grid);
        let inverse = InverseMapping::build(&grid, &normalized_lon);
        Self {
            grid,
            raster_width,
            raster_height,
            crossing,
            inverse,
        }
    }

    /// Sample the bands and build the estimator in one go.
    pub fn from_bands(bands: &CoordinateBands, step: usize) -> Result<Self> {
        let grid = TiePointGrid::from_bands(bands, step)?;
        Ok(Self::new(grid, bands.width(), bands.height()))
    }

    pub fn grid(&self) -> &TiePointGrid {
        &self.grid
    }

    /// Whether inverse lookups are available.
    pub fn has_inverse(&self) -> bool {
        self.inverse.is_some()
    }
}

impl Estimator for TiePointEstimator {
    fn geo_pos(&self, pixel: PixelPos) -> GeoPos {
        if !pixel.is_valid()
            || pixel.x < 0.0
            || pixel.y < 0.0
            || pixel.x > self.raster_width as f64
            || pixel.y > self.raster_height as f64
        {
            return GeoPos::invalid();
        }
        let g = &self.grid;
        let fi = (pixel.x - g.offset_x) / g.sub_x;
        let fj = (pixel.y - g.offset_y) / g.sub_y;
        let i0 = (fi.floor().max(0.0) as usize).min(g.width - 2);
        let j0 = (fj.floor().max(0.0) as usize).min(g.height - 2);
        let wx = fi - i0 as f64;
        let wy = fj - j0 as f64;

        let lat = interpolate(
            wx,
            wy,
            g.lat_at(i0, j0),
            g.lat_at(i0 + 1, j0),
            g.lat_at(i0, j0 + 1),
            g.lat_at(i0 + 1, j0 + 1),
        );
        let lon = interpolate_lon(
            wx,
            wy,
            g.lon_at(i0, j0),
            g.lon_at(i0 + 1, j0),
            g.lon_at(i0, j0 + 1),
            g.lon_at(i0 + 1, j0 + 1),
        );
        if lat.is_nan() || lon.is_nan() {
            return GeoPos::invalid();
        }
        GeoPos::new(lat, lon)
    }

    fn pixel_pos(&self, geo: GeoPos) -> PixelPos {
        match &self.inverse {
            Some(inverse) => inverse.pixel_pos(geo),
            None => PixelPos::invalid(),
        }
    }

    fn is_crossing_antimeridian(&self) -> bool {
        self.crossing
    }
}

fn rescale_lat(lat: f64) -> f64 {
    lat / 90.0
}

fn rescale_lon(lon: f64, center_lon: f64) -> f64 {
    (lon - center_lon) / 90.0
}

/// Remove 360° jumps line by line. Each point is compared with its left
/// neighbour, the first point of a line with the first point of the line
/// above. Returns the unwrapped longitudes and whether any jump was found.
fn normalize_lon_grid(grid: &TiePointGrid) -> (Vec<f64>, bool) {
    let (w, h) = (grid.width, grid.height);
    let mut lons: Vec<f64> = grid.lon.iter().map(|v| *v as f64).collect();
    let mut west = false;
    let mut east = false;

    for y in 0..h {
        for x in 0..w {
            let index = x + y * w;
            if index == 0 {
                continue;
            }
            let base = if x == 0 { lons[index - w] } else { lons[index - 1] };
            let delta = lons[index] - base;
            if delta > 180.0 {
                lons[index] -= 360.0;
                west = true;
            } else if delta < -180.0 {
                lons[index] += 360.0;
                east = true;
            }
        }
    }

    // Western unwrapping can reach -540; lift everything back above -180.
    if west {
        for lon in &mut lons {
            *lon += 360.0;
        }
    }

    (lons, west || east)
}

/// Split the tie points into roughly square tiles of at least
/// `MIN_POINTS_PER_TILE` points each.
fn tile_layout(grid: &TiePointGrid) -> (usize, usize) {
    let points = grid.width * grid.height;
    let pixel_w = grid.width as f64 * grid.sub_x;
    let pixel_h = grid.height as f64 * grid.sub_y;
    let mut num_tiles = points.div_ceil(MIN_POINTS_PER_TILE);

    while num_tiles > 1 {
        let (ti, tj) = fit_dimension(num_tiles, pixel_w, pixel_h);
        let ti = ti.min(grid.width);
        let tj = tj.min(grid.height);
        if points / (ti * tj) >= MIN_POINTS_PER_TILE {
            return (ti, tj);
        }
        num_tiles -= 1;
    }
    (1, 1)
}

/// Factor `n` into `ni x nj` tiles matching the aspect ratio `w : h`.
fn fit_dimension(n: usize, w: f64, h: f64) -> (usize, usize) {
    let ni = ((n as f64 * w / h).sqrt().round() as usize).max(1);
    let nj = ((n as f64 / ni as f64).round() as usize).max(1);
    (ni, nj)
}

/// Tile rectangles in tie-point indices, extended by `overlap` on every side.
fn subdivide(w: usize, h: usize, ni: usize, nj: usize, overlap: usize) -> Vec<PixelRect> {
    let mut rects = Vec::with_capacity(ni * nj);
    for j in 0..nj {
        let y0 = (j * h / nj).saturating_sub(overlap);
        let y1 = ((j + 1) * h / nj + overlap).min(h);
        for i in 0..ni {
            let x0 = (i * w / ni).saturating_sub(overlap);
            let x1 = ((i + 1) * w / ni + overlap).min(w);
            rects.push(PixelRect::new(
                x0 as i64,
                y0 as i64,
                (x1 - x0) as i64,
                (y1 - y0) as i64,
            ));
        }
    }
    rects
}

/// Strides `(num_u, num_v, step_i, step_j)` keeping a tile's warp points
/// below `MAX_POINTS_PER_TILE`, thinning the longer axis first.
fn warp_parameters(sw: usize, sh: usize) -> (usize, usize, usize, usize) {
    let mut num_u = sw;
    let mut num_v = sh;
    let mut step_i = 1;
    let mut step_j = 1;

    let mut adjust_i = num_u >= num_v;
    while num_u * num_v > MAX_POINTS_PER_TILE {
        if adjust_i {
            step_i += 1;
            num_u = sw.div_ceil(step_i);
        } else {
            step_j += 1;
            num_v = sh.div_ceil(step_j);
        }
        adjust_i = num_u >= num_v;
    }
    (num_u, num_v, step_i, step_j)
}

/// Warp points `(lat, lon, x, y)` for one tile, skipping unusable samples.
fn warp_points(grid: &TiePointGrid, lons: &[f64], rect: &PixelRect) -> Vec<[f64; 4]> {
    let i1 = rect.x as usize;
    let i2 = rect.right() as usize - 1;
    let j1 = rect.y as usize;
    let j2 = rect.bottom() as usize - 1;
    let (num_u, num_v, step_i, step_j) = warp_parameters(rect.width as usize, rect.height as usize);

    let mut points = Vec::with_capacity(num_u * num_v);
    for v in 0..num_v {
        let j = (j1 + v * step_j).min(j2);
        for u in 0..num_u {
            let i = (i1 + u * step_i).min(i2);
            let lat = grid.lat_at(i, j);
            let lon = lons[j * grid.width + i];
            if !lat.is_finite() || !lon.is_finite() {
                continue;
            }
            let (x, y) = grid.pixel_of(i, j);
            points.push([lat, lon, x, y]);
        }
    }
    points
}

fn create_approximation(
    grid: &TiePointGrid,
    lons: &[f64],
    rect: &PixelRect,
) -> Option<Approximation> {
    let data = warp_points(grid, lons, rect);
    if data.is_empty() {
        return None;
    }

    let n = data.len() as f64;
    let center_lat = data.iter().map(|p| p[0]).sum::<f64>() / n;
    let center_lon = data.iter().map(|p| p[1]).sum::<f64>() / n;
    let max_square_distance = data
        .iter()
        .map(|p| {
            let dlat = p[0] - center_lat;
            let dlon = p[1] - center_lon;
            dlat * dlat + dlon * dlon
        })
        .fold(0.0, f64::max);

    let x_points: Vec<_> = data
        .iter()
        .map(|p| (rescale_lat(p[0]), rescale_lon(p[1], center_lon), p[2]))
        .collect();
    let y_points: Vec<_> = data
        .iter()
        .map(|p| (rescale_lat(p[0]), rescale_lon(p[1], center_lon), p[3]))
        .collect();

    let fx = Polynomial::best_fit(&x_points, ABS_ERROR_LIMIT)?;
    let fy = Polynomial::best_fit(&y_points, ABS_ERROR_LIMIT)?;
    debug!(
        x_kind = ?fx.kind(),
        y_kind = ?fy.kind(),
        rmse_x = fx.rmse(),
        rmse_y = fy.rmse(),
        "tie-point tile approximated"
    );

    Some(Approximation {
        fx,
        fy,
        center_lat,
        center_lon,
        max_square_distance: max_square_distance * 1.1,
    })
}
