//! Synthetic inputs for demo and manual end-to-end runs: a planar DEM ramp, a
//! uniform rainfall grid, a study area covering the whole grid and a run
//! config pointing at all three.

use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde_json::json;

use landslide_core::coords::{CellSize, GeoTransform, SpatialRef};
use landslide_core::io::write_geotiff;
use landslide_core::{Raster, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "synth", about = "Write a synthetic DEM, rainfall raster and study area")]
struct Args {
    /// Output directory.
    #[arg(short, long, default_value = "data/synth")]
    out: PathBuf,

    /// Grid size (cells per side).
    #[arg(short, long, default_value_t = 10)]
    size: usize,

    /// Cell size in metres.
    #[arg(long, default_value_t = 30.0)]
    cell: f64,

    /// Ramp inclination, rising eastwards.
    #[arg(long, default_value_t = 10.0)]
    slope_deg: f64,

    /// Elevation of the western edge.
    #[arg(long, default_value_t = 1000.0)]
    base: f64,

    /// Uniform rainfall (mm).
    #[arg(long, default_value_t = 50.0)]
    rain: f32,

    #[arg(long, default_value_t = 32633)]
    epsg: u16,

    /// Upper-left corner easting / northing.
    #[arg(long, default_value_t = 500_000.0)]
    origin_x: f64,
    #[arg(long, default_value_t = 4_100_000.0)]
    origin_y: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(args.size >= 3, "size must be at least 3 for slope to have interior cells");
    ensure!(args.cell > 0.0, "cell size must be positive");
    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;

    let n = args.size;
    let gt = GeoTransform::new(args.origin_x, args.origin_y, CellSize::square(args.cell));
    let sr = Some(SpatialRef(args.epsg));

    let rise = args.cell * args.slope_deg.to_radians().tan();
    let elevations = (0..n * n).map(|i| (args.base + (i % n) as f64 * rise) as f32).collect();
    let dem = Raster::from_vec("dem", elevations, n, n, gt)?.with_spatial_ref(sr);
    let rainfall = Raster::new("rainfall", n, n, gt, args.rain).with_spatial_ref(sr);

    let dem_path = args.out.join("dem.tif");
    let rain_path = args.out.join("rainfall.tif");
    write_geotiff(&dem, &dem_path).with_context(|| format!("writing {}", dem_path.display()))?;
    write_geotiff(&rainfall, &rain_path).with_context(|| format!("writing {}", rain_path.display()))?;

    let e = dem.extent();
    let area = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "name": "synthetic study area" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [e.min_x, e.min_y], [e.max_x, e.min_y], [e.max_x, e.max_y],
                    [e.min_x, e.max_y], [e.min_x, e.min_y]
                ]]
            }
        }]
    });
    let area_path = args.out.join("study_area.geojson");
    fs::write(&area_path, serde_json::to_string_pretty(&area)?)
        .with_context(|| format!("writing {}", area_path.display()))?;

    let (cx, cy) = gt.cell_center(n / 2, n / 2);
    let config = RunConfig {
        dem: dem_path.clone(),
        rainfall: rain_path.clone(),
        study_area: area_path.clone(),
        output: args.out.join("output"),
        x: Some(cx.to_string()),
        y: Some(cy.to_string()),
        ..RunConfig::default()
    };
    let config_path = args.out.join("run.json");
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!("Wrote {}", dem_path.display());
    println!("Wrote {}", rain_path.display());
    println!("Wrote {}", area_path.display());
    println!("Wrote {}", config_path.display());
    Ok(())
}
