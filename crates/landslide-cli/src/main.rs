//! landslide-risk: run the susceptibility pipeline from the command line.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use landslide_core::{run, DomainPolicy, QueryOutcome, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "landslide-risk",
    about = "Weighted slope / rainfall / elevation landslide risk over a study area"
)]
struct Args {
    /// Elevation GeoTIFF (metres).
    #[arg(long)]
    dem: Option<PathBuf>,

    /// Rainfall GeoTIFF (mm).
    #[arg(long)]
    rainfall: Option<PathBuf>,

    /// Study-area boundary (GeoJSON polygon or multipolygon).
    #[arg(long)]
    study_area: Option<PathBuf>,

    /// Output workspace directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Query point x, in raster coordinates.
    #[arg(short, long, allow_hyphen_values = true)]
    x: Option<String>,

    /// Query point y, in raster coordinates.
    #[arg(short, long, allow_hyphen_values = true)]
    y: Option<String>,

    /// JSON run configuration; flags given on the command line take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Abort on values outside the breakpoint tables instead of writing nodata.
    #[arg(long)]
    strict_domain: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn build_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            RunConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            let missing: Vec<&str> = [
                ("--dem", args.dem.is_none()),
                ("--rainfall", args.rainfall.is_none()),
                ("--study-area", args.study_area.is_none()),
                ("--output", args.output.is_none()),
            ]
            .into_iter()
            .filter_map(|(flag, absent)| absent.then_some(flag))
            .collect();
            if !missing.is_empty() {
                bail!("missing required arguments without --config: {}", missing.join(", "));
            }
            RunConfig::default()
        }
    };

    if let Some(p) = &args.dem {
        cfg.dem = p.clone();
    }
    if let Some(p) = &args.rainfall {
        cfg.rainfall = p.clone();
    }
    if let Some(p) = &args.study_area {
        cfg.study_area = p.clone();
    }
    if let Some(p) = &args.output {
        cfg.output = p.clone();
    }
    if args.x.is_some() {
        cfg.x = args.x.clone();
    }
    if args.y.is_some() {
        cfg.y = args.y.clone();
    }
    if args.strict_domain {
        cfg.domain_policy = DomainPolicy::Fail;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    let cfg = build_config(&args)?;
    let report = run(&cfg).with_context(|| format!("landslide risk run into {} failed", cfg.output.display()))?;

    println!("Result: {}", report.result_path.display());
    for (category, cells) in &report.categories {
        println!("  {category:<14} {cells:>8} cells");
    }
    match &report.query {
        Some(QueryOutcome::Category { category, score }) => {
            println!("Query point: {category} (score {score:.2})");
        }
        Some(outcome) => println!("Query point: {outcome}"),
        None => {}
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Report: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from([
            "landslide-risk",
            "--dem",
            "a.tif",
            "--rainfall",
            "b.tif",
            "--study-area",
            "c.geojson",
            "--output",
            "out",
            "-x",
            "-12.5",
            "-y",
            "40",
            "--strict-domain",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.dem, PathBuf::from("a.tif"));
        assert_eq!(cfg.output, PathBuf::from("out"));
        assert_eq!(cfg.x.as_deref(), Some("-12.5"));
        assert_eq!(cfg.domain_policy, DomainPolicy::Fail);
    }

    #[test]
    fn missing_inputs_without_config_is_an_error() {
        let args = Args::parse_from(["landslide-risk", "--dem", "a.tif"]);
        let err = build_config(&args).unwrap_err().to_string();
        assert!(err.contains("--rainfall"));
        assert!(err.contains("--output"));
    }
}
