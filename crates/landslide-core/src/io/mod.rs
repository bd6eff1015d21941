//! Dataset I/O: GeoTIFF rasters in an output workspace and GeoJSON study areas.

mod geotiff;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::clip::StudyArea;
use crate::error::Result;
use crate::raster::Raster;

pub use geotiff::{read_geotiff, write_geotiff};

// ── Fixed output names ──────────────────────────────────────────────────────

pub const DEM_CLIP: &str = "dem_clip";
pub const RAINFALL_CLIP: &str = "rfall_clip";
pub const CATEGORY_RASTER: &str = "landslide_risk_category";
/// Continuous score raster. Its presence marks a completed run.
pub const RESULT_RASTER: &str = "landslide_risk_result_2";

const TIFF_EXT: &str = "tif";

/// Named raster persistence.
pub trait RasterStore {
    fn read(&self, name: &str) -> Result<Raster>;

    /// Persist `raster` under `name`, replacing any existing dataset.
    fn write(&self, raster: &Raster, name: &str) -> Result<PathBuf>;

    /// Delete `name` if present. Returns whether anything was removed.
    fn remove(&self, name: &str) -> Result<bool>;

    /// Write then reload, so later stages work on the persisted grid.
    fn materialize(&self, raster: &Raster, name: &str) -> Result<Raster> {
        self.write(raster, name)?;
        self.read(name)
    }
}

/// A directory of `<name>.tif` GeoTIFFs.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open (creating if needed) the workspace directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name).with_extension(TIFF_EXT)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }
}

impl RasterStore for Workspace {
    fn read(&self, name: &str) -> Result<Raster> {
        read_geotiff(&self.path_of(name), name)
    }

    fn write(&self, raster: &Raster, name: &str) -> Result<PathBuf> {
        let path = self.path_of(name);
        let partial = path.with_extension(format!("{TIFF_EXT}.partial"));
        if let Err(e) = write_geotiff(raster, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, &path)?;
        debug!("wrote {} ({}x{}) to {}", name, raster.width, raster.height, path.display());
        Ok(path)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Load a study area from a GeoJSON file; the file stem names the area.
pub fn read_study_area(path: &Path) -> Result<StudyArea> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "study_area".to_string());
    StudyArea::from_geojson(name, &text)
}

/// Load an input raster; the file stem names it.
pub fn read_raster(path: &Path) -> Result<Raster> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    read_geotiff(path, &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{CellSize, GeoTransform};

    #[test]
    fn write_replaces_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().join("out")).unwrap();
        let gt = GeoTransform::new(0.0, 20.0, CellSize::square(10.0));

        ws.write(&Raster::new("a", 2, 2, gt, 1.0), "dem_clip").unwrap();
        ws.write(&Raster::new("a", 2, 2, gt, 2.0), "dem_clip").unwrap();

        let back = ws.read("dem_clip").unwrap();
        assert_eq!(back.name, "dem_clip");
        assert!(back.data.iter().all(|&v| v == 2.0));
        assert!(!dir.path().join("out/dem_clip.tif.partial").exists());
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert!(!ws.remove(RESULT_RASTER).unwrap());
        let gt = GeoTransform::new(0.0, 10.0, CellSize::square(10.0));
        ws.write(&Raster::new("r", 1, 1, gt, 3.0), RESULT_RASTER).unwrap();
        assert!(ws.exists(RESULT_RASTER));
        assert!(ws.remove(RESULT_RASTER).unwrap());
        assert!(!ws.exists(RESULT_RASTER));
    }

    #[test]
    fn materialize_returns_the_persisted_raster() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let gt = GeoTransform::new(100.0, 200.0, CellSize::square(5.0));
        let mut r = Raster::new("clip", 3, 2, gt, 7.5);
        r.set(1, 2, f32::NAN);
        let m = ws.materialize(&r, RAINFALL_CLIP).unwrap();
        assert!(m.same_grid(&r));
        assert_eq!(m.valid_count(), 5);
        assert_eq!(m.value(0, 0), Some(7.5));
    }
}
