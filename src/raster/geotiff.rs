use crate::error::{AatoolboxError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::ColorType;

/// North-up affine transform of a raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Longitude of the top-left corner
    pub origin_x: f64,
    /// Latitude of the top-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Coordinates of the centre of pixel (`col`, `row`)
    pub fn pixel_centre(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }
}

/// A single band raster with values widened to `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub data: Vec<f64>,
}

impl Raster {
    pub fn new(width: usize, height: usize, transform: GeoTransform, data: Vec<f64>) -> Result<Self> {
        if data.len() != width * height {
            return Err(AatoolboxError::Raster(format!(
                "expected {} values for a {}x{} raster, got {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }
        if transform.pixel_width <= 0.0 || transform.pixel_height <= 0.0 {
            return Err(AatoolboxError::Raster("pixel size must be positive".to_string()));
        }
        Ok(Self { width, height, transform, data })
    }

    /// Decode a single band GeoTIFF
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
            return Err(AatoolboxError::Raster(format!(
                "{} is not a single band raster",
                path.as_ref().display()
            )));
        }

        let (width, height) = decoder.dimensions()?;
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag)?;
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag)?;
        let transform = transform_from_tags(&scale, &tiepoint)?;

        let data = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F64(v) => v,
            _ => {
                return Err(AatoolboxError::Raster(format!(
                    "unsupported sample type in {}",
                    path.as_ref().display()
                )))
            }
        };

        Self::new(width as usize, height as usize, transform, data)
    }

    /// Write the raster as a 32-bit float GeoTIFF
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        let mut encoder = TiffEncoder::new(&mut writer)?;
        let mut image = encoder.new_image::<colortype::Gray32Float>(self.width as u32, self.height as u32)?;

        let scale = [self.transform.pixel_width, self.transform.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, self.transform.origin_x, self.transform.origin_y, 0.0];
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

        let samples: Vec<f32> = self.data.iter().map(|&v| v as f32).collect();
        image.write_data(&samples)?;
        Ok(())
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }
}

fn transform_from_tags(scale: &[f64], tiepoint: &[f64]) -> Result<GeoTransform> {
    match (scale, tiepoint) {
        ([sx, sy, ..], [i, j, _, x, y, ..]) => Ok(GeoTransform {
            origin_x: x - i * sx,
            origin_y: y + j * sy,
            pixel_width: *sx,
            pixel_height: *sy,
        }),
        _ => Err(AatoolboxError::Raster(
            "GeoTIFF lacks pixel scale or tiepoint".to_string(),
        )),
    }
}
