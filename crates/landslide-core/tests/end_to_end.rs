use std::fs;
use std::path::{Path, PathBuf};

use landslide_core::coords::{CellSize, GeoTransform, SpatialRef};
use landslide_core::io::{read_geotiff, write_geotiff, CATEGORY_RASTER, DEM_CLIP, RAINFALL_CLIP, RESULT_RASTER};
use landslide_core::{run, DomainPolicy, Level, QueryOutcome, Raster, RiskCategory, RiskError, RunConfig, WEIGHTS};

const N: usize = 10;
const CELL: f64 = 30.0;
const UTM33N: SpatialRef = SpatialRef(32633);

/// 10×10 DEM rising eastwards at 10°, starting at 1000 m.
fn dem_ramp(n: usize, cell: f64) -> Raster {
    let gt = GeoTransform::new(0.0, n as f64 * cell, CellSize::square(cell));
    let rise = cell * 10f64.to_radians().tan();
    let data = (0..n * n).map(|i| (1000.0 + (i % n) as f64 * rise) as f32).collect();
    Raster::from_vec("dem", data, n, n, gt).unwrap().with_spatial_ref(Some(UTM33N))
}

fn uniform_rain(n: usize, cell: f64, mm: f32) -> Raster {
    let gt = GeoTransform::new(0.0, n as f64 * cell, CellSize::square(cell));
    Raster::new("rainfall", n, n, gt, mm).with_spatial_ref(Some(UTM33N))
}

fn square_geojson(min: f64, max: f64) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{}},
        "geometry":{{"type":"Polygon","coordinates":[[[{min},{min}],[{max},{min}],[{max},{max}],[{min},{max}],[{min},{min}]]]}}}}]}}"#
    )
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: RunConfig,
}

fn fixture(dem: &Raster, rain: &Raster, area: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    write_geotiff(dem, &input.join("dem.tif")).unwrap();
    write_geotiff(rain, &input.join("rainfall.tif")).unwrap();
    fs::write(input.join("study_area.geojson"), area).unwrap();

    let config = RunConfig {
        dem: input.join("dem.tif"),
        rainfall: input.join("rainfall.tif"),
        study_area: input.join("study_area.geojson"),
        output: dir.path().join("output"),
        ..RunConfig::default()
    };
    Fixture { _dir: dir, config }
}

fn output(cfg: &RunConfig, name: &str) -> PathBuf {
    cfg.output.join(format!("{name}.tif"))
}

fn read(path: &Path) -> Raster {
    read_geotiff(path, "check").unwrap()
}

#[test]
fn synthetic_ramp_is_moderate_everywhere() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(0.0, 300.0));
    let mut cfg = fx.config.clone();
    cfg.x = Some("150".into());
    cfg.y = Some("150".into());

    let report = run(&cfg).unwrap();

    // Border slope cells are nodata, so only the 8×8 interior is scored.
    assert_eq!(report.scored_cells, 64);
    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.categories.get(&RiskCategory::Moderate), Some(&64));
    assert!(!report.resampled);
    for f in &report.factors {
        assert_eq!(f.unclassified, 0);
        assert_eq!(f.out_of_domain, 0);
    }

    match report.query {
        Some(QueryOutcome::Category { category, score }) => {
            assert_eq!(category, RiskCategory::Moderate);
            assert!((score - 1.4).abs() < 1e-6);
        }
        other => panic!("unexpected query outcome {other:?}"),
    }

    for name in [DEM_CLIP, RAINFALL_CLIP, CATEGORY_RASTER, RESULT_RASTER] {
        assert!(output(&cfg, name).is_file(), "{name} missing");
    }
    assert_eq!(report.result_path, output(&cfg, RESULT_RASTER));
    assert_eq!(report.diagnostics.warnings().count(), 0);
}

#[test]
fn diagnostics_follow_stage_order() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(0.0, 300.0));
    let report = run(&fx.config).unwrap();
    let messages = report.diagnostics.messages();

    let expected_prefixes = [
        "Loaded DEM",
        "Checking cell sizes",
        "Cell sizes match",
        "Spatial references match",
        "Processing context from rainfall",
        "Clipped DEM",
        "Clipped rainfall",
        "Derived slope",
        "Reclassified slope",
        "Reclassified rainfall",
        "Reclassified elevation",
        "Weighted overlay",
        "Moderate Risk: 64 cells",
        "Saved risk score raster",
        "No query coordinates supplied",
    ];
    assert_eq!(messages.len(), expected_prefixes.len(), "{messages:#?}");
    for (msg, prefix) in messages.iter().zip(expected_prefixes) {
        assert!(msg.starts_with(prefix), "{msg:?} should start with {prefix:?}");
    }
}

#[test]
fn persisted_result_reloads_exactly() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(0.0, 300.0));
    run(&fx.config).unwrap();

    let score = read(&output(&fx.config, RESULT_RASTER));
    let expected = WEIGHTS.score(1.0, 1.0, 3.0);
    assert_eq!((score.width, score.height), (N, N));
    assert_eq!(score.spatial_ref, Some(UTM33N));
    for r in 1..N - 1 {
        for c in 1..N - 1 {
            assert_eq!(score.get(r, c).to_bits(), expected.to_bits());
        }
    }
    assert!(score.get(0, 0).is_nan());

    let cats = read(&output(&fx.config, CATEGORY_RASTER));
    assert_eq!(cats.get(4, 4), f32::from(RiskCategory::Moderate.code()));
    assert!(cats.get(N - 1, 3).is_nan());
}

#[test]
fn point_outside_study_extent_is_reported_not_fatal() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(0.0, 150.0));
    let mut cfg = fx.config.clone();
    cfg.x = Some("250".into());
    cfg.y = Some("250".into());

    let report = run(&cfg).unwrap();
    assert_eq!(report.query, Some(QueryOutcome::NotInExtent));
    assert!(output(&cfg, RESULT_RASTER).is_file());
    let last = report.diagnostics.entries().last().unwrap();
    assert_eq!(last.level, Level::Warn);
    assert!(last.message.contains("not within the study extent"));
}

#[test]
fn disjoint_study_area_fails_and_clears_stale_result() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(1000.0, 2000.0));
    fs::create_dir_all(&fx.config.output).unwrap();
    let stale = output(&fx.config, RESULT_RASTER);
    fs::write(&stale, b"left over from an earlier run").unwrap();

    let err = run(&fx.config).unwrap_err();
    assert!(matches!(err, RiskError::ClipExtentDisjoint { .. }), "{err}");
    assert!(!stale.exists());
    assert!(!output(&fx.config, DEM_CLIP).exists());
}

#[test]
fn malformed_coordinate_aborts_before_outputs() {
    let fx = fixture(&dem_ramp(N, CELL), &uniform_rain(N, CELL, 50.0), &square_geojson(0.0, 300.0));
    let mut cfg = fx.config.clone();
    cfg.x = Some("east".into());
    cfg.y = Some("100".into());

    let err = run(&cfg).unwrap_err();
    assert!(matches!(err, RiskError::CoordinateParse { axis: "x", .. }));
    assert!(!output(&cfg, DEM_CLIP).exists());
    assert!(!output(&cfg, RESULT_RASTER).exists());
}

#[test]
fn mixed_resolutions_are_aligned_to_the_coarsest() {
    // 10 m DEM over the same 300 m square as a 30 m rainfall grid.
    let fx = fixture(&dem_ramp(30, 10.0), &uniform_rain(N, CELL, 200.0), &square_geojson(0.0, 300.0));
    let report = run(&fx.config).unwrap();

    assert!(report.resampled);
    assert!(report.context.cell_size.approx_eq(CellSize::square(30.0)));
    let score = read(&output(&fx.config, RESULT_RASTER));
    assert_eq!((score.width, score.height), (N, N));
    // Rainfall class 3 lifts the interior score to 0.5 + 0.9 + 0.6 = 2.0.
    assert!((score.get(5, 5) - 2.0).abs() < 1e-6);
}

#[test]
fn spatial_reference_mismatch_is_only_a_warning() {
    let rain = uniform_rain(N, CELL, 50.0).with_spatial_ref(Some(SpatialRef(32632)));
    let fx = fixture(&dem_ramp(N, CELL), &rain, &square_geojson(0.0, 300.0));
    let report = run(&fx.config).unwrap();
    let warnings: Vec<_> = report.diagnostics.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("EPSG:32633 vs rainfall EPSG:32632"));
    assert_eq!(report.scored_cells, 64);
}

#[test]
fn out_of_domain_rainfall_follows_policy() {
    let mut rain = uniform_rain(N, CELL, 50.0);
    rain.set(4, 4, -5.0);
    let fx = fixture(&dem_ramp(N, CELL), &rain, &square_geojson(0.0, 300.0));

    let report = run(&fx.config).unwrap();
    let rainfall = report.factors.iter().find(|f| f.factor.to_string() == "rainfall").unwrap();
    assert_eq!(rainfall.out_of_domain, 1);
    assert_eq!(report.scored_cells, 63);

    let strict = RunConfig { domain_policy: DomainPolicy::Fail, ..fx.config.clone() };
    assert!(matches!(run(&strict), Err(RiskError::OutOfDomain { .. })));
    assert!(!output(&strict, RESULT_RASTER).exists());
}
