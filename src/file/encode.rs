//! Raster encoding of layer surfaces

use super::types::{ExportFormat, FileError};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;

/// Turns a surface into encoded file bytes
pub trait LayerEncoder: Sync {
    fn encode(&self, surface: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, FileError>;
}

/// PNG/JPEG encoder backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct RasterEncoder {
    jpeg_quality: u8,
}

impl RasterEncoder {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for RasterEncoder {
    fn default() -> Self {
        Self::new(92)
    }
}

impl LayerEncoder for RasterEncoder {
    fn encode(&self, surface: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, FileError> {
        match format {
            ExportFormat::Png => encode_png(surface),
            ExportFormat::Jpeg => encode_jpeg(surface, self.jpeg_quality),
        }
    }
}

/// Encode RGBA image to PNG bytes
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, FileError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Encode RGBA image to JPEG bytes, flattening transparency onto black
pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> Result<Vec<u8>, FileError> {
    let rgb = flatten_alpha(img);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;
    Ok(buf)
}

fn flatten_alpha(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let a = u16::from(p[3]);
        let premultiply = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        Rgb([premultiply(p[0]), premultiply(p[1]), premultiply(p[2])])
    })
}
