//! Study-area clipping.
//!
//! A clip keeps the cells whose centres fall inside the study-area polygons
//! and writes nodata elsewhere. The output window is the study-area bounding
//! box snapped outward to the processing grid, so every raster clipped with
//! the same context and area lands on an identical grid.

use geo::{BoundingRect, Geometry, Intersects, MultiPolygon, Point, Polygon};
use geojson::GeoJson;

use crate::context::ProcessingContext;
use crate::coords::Extent;
use crate::error::{Result, RiskError};
use crate::maybe_rayon::*;
use crate::raster::Raster;

/// Polygon boundary of the analysis. Used only as a clip mask.
#[derive(Debug, Clone)]
pub struct StudyArea {
    pub name: String,
    shape: MultiPolygon<f64>,
    bounds: Extent,
}

impl StudyArea {
    pub fn new(name: impl Into<String>, shape: MultiPolygon<f64>) -> Result<Self> {
        let rect = shape.bounding_rect().ok_or(RiskError::EmptyStudyArea)?;
        let bounds = Extent::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            return Err(RiskError::EmptyStudyArea);
        }
        Ok(Self { name: name.into(), shape, bounds })
    }

    /// Axis-aligned rectangle as a single-polygon study area.
    pub fn from_extent(name: impl Into<String>, extent: Extent) -> Result<Self> {
        let rect = geo::Rect::new(
            geo::coord! { x: extent.min_x, y: extent.min_y },
            geo::coord! { x: extent.max_x, y: extent.max_y },
        );
        Self::new(name, MultiPolygon::new(vec![rect.to_polygon()]))
    }

    /// Parse a GeoJSON document and keep every Polygon / MultiPolygon in it,
    /// at any nesting level (Feature, FeatureCollection, GeometryCollection).
    pub fn from_geojson(name: impl Into<String>, text: &str) -> Result<Self> {
        let gj: GeoJson = text.parse()?;
        let collection = geo::GeometryCollection::<f64>::try_from(&gj)?;
        let mut polygons: Vec<Polygon<f64>> = Vec::new();
        collect_polygons(collection.into_iter(), &mut polygons);
        if polygons.is_empty() {
            return Err(RiskError::EmptyStudyArea);
        }
        Self::new(name, MultiPolygon::new(polygons))
    }

    pub fn extent(&self) -> Extent {
        self.bounds
    }

    /// Points on the boundary count as inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.shape.intersects(&Point::new(x, y))
    }
}

fn collect_polygons(geoms: impl Iterator<Item = Geometry<f64>>, out: &mut Vec<Polygon<f64>>) {
    for g in geoms {
        match g {
            Geometry::Polygon(p) => out.push(p),
            Geometry::MultiPolygon(mp) => out.extend(mp),
            Geometry::GeometryCollection(gc) => collect_polygons(gc.into_iter(), out),
            _ => {}
        }
    }
}

/// Clip `raster` to `area` on the context grid, producing a new raster named
/// `name`.
///
/// Fails with [`RiskError::ClipExtentDisjoint`] when the study area does not
/// overlap the raster (or the processing extent) at all.
pub fn clip(raster: &Raster, area: &StudyArea, ctx: &ProcessingContext, name: &str) -> Result<Raster> {
    let disjoint = || RiskError::ClipExtentDisjoint {
        raster: raster.name.clone(),
        area: area.name.clone(),
        extent: raster.extent().to_string(),
    };

    if !area.extent().intersects(&raster.extent()) {
        return Err(disjoint());
    }
    let (transform, width, height) = ctx.snapped_window(&area.extent()).ok_or_else(disjoint)?;

    let data: Vec<f32> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            (0..width)
                .map(|col| {
                    let (x, y) = transform.cell_center(row, col);
                    if ctx.mask.contains(x, y) && area.contains(x, y) {
                        raster.sample_cell(x, y).unwrap_or(f32::NAN)
                    } else {
                        f32::NAN
                    }
                })
                .collect::<Vec<f32>>()
        })
        .collect();

    Ok(Raster::from_vec(name, data, width, height, transform)?.with_spatial_ref(raster.spatial_ref))
}
