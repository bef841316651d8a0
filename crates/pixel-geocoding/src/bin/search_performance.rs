//! Inverse lookup throughput on a synthetic swath.
//!
//! This tool:
//! 1. Generates a tilted lat/lon swath in memory
//! 2. Builds geo-codings for each requested raster mode, with and without
//!    an internal tie-point estimator
//! 3. Resolves a lattice of targets concurrently on a rayon pool
//! 4. Reports timings, hit counts and tile cache statistics
//!
//! Run with: cargo run --release --bin search-performance -- --width 2000 --height 1500

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pixel_geocoding::{
    CoordinateBands, GeoPos, PixelGeoCoding, PixelGeoCodingConfig, PixelPos, RasterMode,
};

#[derive(Parser, Debug)]
#[command(name = "search-performance")]
#[command(about = "Measure inverse pixel lookups over a synthetic swath")]
struct Args {
    /// Swath width in pixels
    #[arg(long, default_value = "1200")]
    width: usize,

    /// Swath height in pixels
    #[arg(long, default_value = "900")]
    height: usize,

    /// Number of lookups per configuration
    #[arg(long, default_value = "2000")]
    samples: usize,

    /// Worker threads (0 = rayon default)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Raster mode: tiled, in_memory or both
    #[arg(long, default_value = "both")]
    mode: String,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Degrees per pixel of the synthetic swath.
const STEP: f64 = 0.01;
/// Lattice tilt in degrees.
const TILT: f64 = 8.0;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("failed to build worker pool")?;

    println!("Pixel Geo-Coding Search Performance");
    println!("===================================\n");

    println!("Generating swath ({} x {})...", args.width, args.height);
    let (lat, lon) = generate_swath(args.width, args.height);
    let bands = CoordinateBands::from_arrays(args.width, args.height, lat, lon)?;
    let targets = lookup_targets(args.width, args.height, args.samples);
    println!("  Targets: {}", targets.len());
    println!("  Threads: {}\n", pool.current_num_threads());

    let modes = match args.mode.to_lowercase().as_str() {
        "both" => vec![RasterMode::Tiled, RasterMode::InMemory],
        other => vec![RasterMode::from_str(other)],
    };

    println!("{:-<86}", "");
    println!(
        "{:<12} {:<12} {:>12} {:>12} {:>10} {:>10} {:>12}",
        "Mode", "Search", "Init", "Lookups", "Per call", "Found", "Cache hits"
    );
    println!("{:-<86}", "");

    let base = PixelGeoCodingConfig::from_env();
    let mut exact_misses = 0usize;
    for mode in modes {
        // The internal estimator is only built for tiled rasters.
        let estimator_options: &[bool] = match mode {
            RasterMode::Tiled => &[true, false],
            RasterMode::InMemory => &[false],
        };
        for &with_estimator in estimator_options {
            let config = PixelGeoCodingConfig {
                use_tiling: mode == RasterMode::Tiled,
                // A subsampling larger than the swath disables the estimator.
                tie_point_subsampling: if with_estimator {
                    base.tie_point_subsampling
                } else {
                    args.width.max(args.height) + 1
                },
                ..base.clone()
            };
            let row = run_configuration(&pool, &bands, config, &targets)?;
            exact_misses += row.misses;

            let search = if row.internal_estimator {
                "window"
            } else {
                "quad-tree"
            };
            let hits = row
                .cache_hit_rate
                .map(|rate| format!("{:.1}%", rate * 100.0))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<12} {:<12} {:>9.1} ms {:>9.1} ms {:>7.1} µs {:>10} {:>12}",
                mode.as_str(),
                search,
                row.init_ms,
                row.lookup_ms,
                row.lookup_ms * 1000.0 / targets.len().max(1) as f64,
                row.found,
                hits
            );
        }
    }
    println!("{:-<86}", "");

    if exact_misses == 0 {
        println!("\n✓ PASS: every target resolved to its source pixel");
    } else {
        println!(
            "\n✗ FAIL: {} lookups did not resolve to their source pixel",
            exact_misses
        );
        std::process::exit(1);
    }
    Ok(())
}

struct Row {
    init_ms: f64,
    lookup_ms: f64,
    found: usize,
    misses: usize,
    internal_estimator: bool,
    cache_hit_rate: Option<f64>,
}

fn run_configuration(
    pool: &rayon::ThreadPool,
    bands: &CoordinateBands,
    config: PixelGeoCodingConfig,
    targets: &[(usize, usize, GeoPos)],
) -> Result<Row> {
    let start = Instant::now();
    let geocoding = PixelGeoCoding::open(bands.clone(), None, config)?;
    let init_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(?geocoding, init_ms, "geo-coding initialized");

    let start = Instant::now();
    let results: Vec<PixelPos> = pool.install(|| {
        targets
            .par_iter()
            .map(|(_, _, geo)| geocoding.resolve_pixel(*geo))
            .collect::<pixel_geocoding::Result<_>>()
    })?;
    let lookup_ms = start.elapsed().as_secs_f64() * 1000.0;

    let found = results.iter().filter(|p| p.is_valid()).count();
    let misses = targets
        .iter()
        .zip(&results)
        .filter(|((x, y, _), p)| **p != PixelPos::new(*x as f64 + 0.5, *y as f64 + 0.5))
        .count();

    Ok(Row {
        init_ms,
        lookup_ms,
        found,
        misses,
        internal_estimator: geocoding.uses_internal_estimator()?,
        cache_hit_rate: geocoding.cache_stats().map(|s| s.hit_rate()),
    })
}

fn swath_lat_lon(x: f64, y: f64) -> (f64, f64) {
    let (sin, cos) = TILT.to_radians().sin_cos();
    let lon = -20.0 + STEP * (x * cos - y * sin);
    let lat = 35.0 + STEP * (x * sin + y * cos);
    (lat, lon)
}

fn generate_swath(width: usize, height: usize) -> (Vec<f32>, Vec<f32>) {
    let mut lat = Vec::with_capacity(width * height);
    let mut lon = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (la, lo) = swath_lat_lon(x as f64, y as f64);
            lat.push(la as f32);
            lon.push(lo as f32);
        }
    }
    (lat, lon)
}

/// Exact sample positions spread evenly over the swath interior.
fn lookup_targets(width: usize, height: usize, count: usize) -> Vec<(usize, usize, GeoPos)> {
    let side = (count as f64).sqrt().ceil().max(1.0) as usize;
    let mut targets = Vec::with_capacity(side * side);
    for j in 0..side {
        for i in 0..side {
            let x = 1 + i * (width - 2) / side;
            let y = 1 + j * (height - 2) / side;
            let (lat, lon) = swath_lat_lon(x as f64, y as f64);
            targets.push((x, y, GeoPos::new(lat as f32 as f64, lon as f32 as f64)));
        }
    }
    targets.truncate(count);
    targets
}
