//! Minimal GeoTIFF codec over the `tiff` crate.
//!
//! Georeferencing is carried in three GeoTIFF tags plus the GDAL nodata tag:
//! ModelPixelScale (33550), ModelTiepoint (33922), GeoKeyDirectory (34735)
//! and GDAL_NODATA (42113). Pixels are always written as 32-bit float so
//! scores and classes round-trip bit-exactly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

use crate::coords::{CellSize, GeoTransform, SpatialRef};
use crate::error::{Result, RiskError};
use crate::raster::{PixelType, Raster};

// Known GeoTIFF ids decode to these named variants, never to `Tag::Unknown`.
const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

// GeoKey ids
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

pub fn read_geotiff(path: &Path, name: &str) -> Result<Raster> {
    let file = File::open(path)?;
    decode(BufReader::new(file), name)
}

pub fn write_geotiff(raster: &Raster, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut sink = BufWriter::new(file);
    encode(raster, &mut sink)?;
    sink.flush()?;
    Ok(())
}

fn decode<R: Read + Seek>(reader: R, name: &str) -> Result<Raster> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let (data, pixel_type): (Vec<f32>, PixelType) = match decoder.read_image()? {
        DecodingResult::U8(buf) => (buf.into_iter().map(f32::from).collect(), PixelType::U8),
        DecodingResult::U16(buf) => (buf.into_iter().map(f32::from).collect(), PixelType::U16),
        DecodingResult::U32(buf) => (buf.into_iter().map(|v| v as f32).collect(), PixelType::U32),
        DecodingResult::I8(buf) => (buf.into_iter().map(f32::from).collect(), PixelType::I8),
        DecodingResult::I16(buf) => (buf.into_iter().map(f32::from).collect(), PixelType::I16),
        DecodingResult::I32(buf) => (buf.into_iter().map(|v| v as f32).collect(), PixelType::I32),
        DecodingResult::F32(buf) => (buf, PixelType::F32),
        DecodingResult::F64(buf) => (buf.into_iter().map(|v| v as f32).collect(), PixelType::F64),
        other => return Err(RiskError::UnsupportedPixelType(pixel_type_name(&other).to_string())),
    };

    let transform = read_transform(&mut decoder).ok_or_else(|| RiskError::MissingGeoreference(name.to_string()))?;
    let spatial_ref = read_spatial_ref(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f32>().ok());

    let mut raster = Raster::from_vec(name, data, width, height, transform)?.with_spatial_ref(spatial_ref);
    raster.nodata = nodata;
    raster.pixel_type = pixel_type;
    Ok(raster)
}

fn pixel_type_name(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U64(_) => "u64",
        DecodingResult::I64(_) => "i64",
        _ => "unknown",
    }
}

/// Upper-left corner and cell size from the pixel-scale and tiepoint tags.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tie = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;
    if scale.len() < 2 || tie.len() < 6 || !(scale[0] > 0.0 && scale[1] > 0.0) {
        return None;
    }
    // tiepoint: raster (I, J, K) -> model (X, Y, Z)
    let origin_x = tie[3] - tie[0] * scale[0];
    let origin_y = tie[4] + tie[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, CellSize::new(scale[0], scale[1])))
}

/// EPSG code from ProjectedCSTypeGeoKey or GeographicTypeGeoKey, when stored
/// inline in the key directory.
fn read_spatial_ref<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<SpatialRef> {
    let keys = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok()?;
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();
    let inline = |id: u16| {
        entries
            .iter()
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| e[3])
            .filter(|&code| code != 0 && code != 32767)
    };
    inline(PROJECTED_CS_TYPE).or_else(|| inline(GEOGRAPHIC_TYPE)).map(SpatialRef)
}

fn encode<W: Write + Seek>(raster: &Raster, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray32Float>(raster.width as u32, raster.height as u32)?;

    let gt = &raster.transform;
    let scale = [gt.cell.x, gt.cell.y, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image.encoder().write_tag(MODEL_PIXEL_SCALE, &scale[..])?;
    image.encoder().write_tag(MODEL_TIEPOINT, &tiepoint[..])?;
    image.encoder().write_tag(GEO_KEY_DIRECTORY, &geo_keys(raster.spatial_ref)[..])?;

    let nodata = match raster.nodata {
        Some(v) if !v.is_nan() => v.to_string(),
        _ => "nan".to_string(),
    };
    image.encoder().write_tag(GDAL_NODATA, nodata.as_str())?;

    image.write_data(&raster.data)?;
    Ok(())
}

/// Key directory: header (version 1.1.0, key count) followed by sorted keys.
fn geo_keys(spatial_ref: Option<SpatialRef>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    match spatial_ref {
        Some(sr) if sr.is_geographic() => {
            keys.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
            keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            keys.push([GEOGRAPHIC_TYPE, 0, 1, sr.epsg()]);
        }
        Some(sr) => {
            keys.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            keys.push([PROJECTED_CS_TYPE, 0, 1, sr.epsg()]);
        }
        None => {
            keys.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
        }
    }
    let mut out = vec![1, 1, 0, keys.len() as u16];
    out.extend(keys.into_iter().flatten());
    out
}
