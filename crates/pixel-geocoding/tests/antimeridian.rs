//! Lookups on swaths that cross the ±180° meridian.

use pixel_geocoding::{CoordinateBands, GeoPos, PixelGeoCoding, PixelGeoCodingConfig, PixelPos};
use test_utils::{assert_approx_eq, assert_pixel_near, create_swath, scenes, SwathSpec};

fn bands(spec: &SwathSpec) -> CoordinateBands {
    let (lat, lon) = create_swath(spec);
    CoordinateBands::from_arrays(spec.width, spec.height, lat, lon).unwrap()
}

/// The antimeridian scene with its meridian column stored as -180.
fn negative_meridian_bands() -> CoordinateBands {
    let spec = scenes::ANTIMERIDIAN;
    let (lat, mut lon) = create_swath(&spec);
    for value in lon.iter_mut().filter(|v| **v == 180.0) {
        *value = -180.0;
    }
    CoordinateBands::from_arrays(spec.width, spec.height, lat, lon).unwrap()
}

fn configurations() -> Vec<PixelGeoCodingConfig> {
    vec![
        PixelGeoCodingConfig::default(),
        PixelGeoCodingConfig {
            tie_point_subsampling: 10_000,
            tile_size: 16,
            ..Default::default()
        },
        PixelGeoCodingConfig {
            use_tiling: false,
            ..Default::default()
        },
    ]
}

// =============================================================================
// Crossing detection
// =============================================================================

#[test]
fn test_crossing_flag() {
    for config in configurations() {
        let crossing =
            PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config.clone()).unwrap();
        assert!(crossing.is_crossing_antimeridian().unwrap());

        let plain = PixelGeoCoding::new(bands(&scenes::MID_LATITUDE), None, config).unwrap();
        assert!(!plain.is_crossing_antimeridian().unwrap());
    }
}

// =============================================================================
// Inverse lookups
// =============================================================================

#[test]
fn test_equivalent_longitudes_give_identical_results() {
    for config in configurations() {
        let geocoding =
            PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config).unwrap();
        let east = geocoding.resolve_pixel(GeoPos::new(-9.8, 179.9)).unwrap();
        let wrapped = geocoding.resolve_pixel(GeoPos::new(-9.8, -180.1)).unwrap();
        assert!(east.is_valid());
        assert_eq!(east, wrapped);
        assert_pixel_near!(east, (40.5, 20.5), 1e-9);
    }
}

#[test]
fn test_query_on_the_meridian() {
    for config in configurations() {
        let geocoding =
            PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config).unwrap();
        for lon in [180.0, -180.0] {
            let pixel = geocoding.resolve_pixel(GeoPos::new(-9.8, lon)).unwrap();
            assert_eq!(pixel, PixelPos::new(50.5, 20.5), "target lon {lon}");
        }
    }
}

#[test]
fn test_meridian_stored_as_negative_180() {
    for config in configurations() {
        let geocoding = PixelGeoCoding::new(negative_meridian_bands(), None, config).unwrap();
        assert!(geocoding.is_crossing_antimeridian().unwrap());
        for lon in [180.0, -180.0, 179.998, -179.998] {
            let pixel = geocoding.resolve_pixel(GeoPos::new(-9.8, lon)).unwrap();
            assert_eq!(pixel, PixelPos::new(50.5, 20.5), "target lon {lon}");
        }
        let pixel = geocoding.resolve_pixel(GeoPos::new(-9.8, 179.993)).unwrap();
        assert_eq!(pixel, PixelPos::new(49.5, 20.5));
        let pixel = geocoding.resolve_pixel(GeoPos::new(-9.8, -179.993)).unwrap();
        assert_eq!(pixel, PixelPos::new(51.5, 20.5));
    }
}

#[test]
fn test_query_west_of_the_meridian() {
    for config in configurations() {
        let geocoding =
            PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config).unwrap();
        let pixel = geocoding.resolve_pixel(GeoPos::new(-9.65, -179.7)).unwrap();
        assert_pixel_near!(pixel, (80.5, 35.5), 1e-9);

        let pixel = geocoding.resolve_pixel(GeoPos::new(-9.65, 180.3)).unwrap();
        assert_pixel_near!(pixel, (80.5, 35.5), 1e-9);
    }
}

#[test]
fn test_far_side_of_the_globe_is_not_found() {
    for config in configurations() {
        let geocoding =
            PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config).unwrap();
        assert!(!geocoding
            .resolve_pixel(GeoPos::new(-9.8, 0.2))
            .unwrap()
            .is_valid());
    }
}

// =============================================================================
// Forward lookups
// =============================================================================

#[test]
fn test_fraction_accuracy_interpolates_across_the_meridian() {
    let config = PixelGeoCodingConfig {
        fraction_accuracy: true,
        ..Default::default()
    };
    let geocoding = PixelGeoCoding::new(bands(&scenes::ANTIMERIDIAN), None, config).unwrap();

    let geo = geocoding.resolve_geo_pos(PixelPos::new(50.9, 10.5)).unwrap();
    assert_approx_eq!(geo.lon, -179.996, 1e-4);
    assert_approx_eq!(geo.lat, -9.9, 1e-5);

    let geo = geocoding.resolve_geo_pos(PixelPos::new(50.3, 10.5)).unwrap();
    assert_approx_eq!(geo.lon, 179.998, 1e-4);
}
