use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use super::{Thumbnail, Thumbnailer};
use crate::error::ConversionError;
use crate::mime::DetectedType;

const JPEG_QUALITY: u8 = 80;

/// Downscales raster images with the `image` crate.
///
/// Images with an alpha channel are encoded as PNG, everything else as JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageThumbnailer;

impl ImageThumbnailer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core, also used by the other converters on their rendered output.
    pub fn render(data: &[u8], max_size: u32) -> Result<Thumbnail, ConversionError> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;

        let (width, height) = img.dimensions();
        let img = if width > max_size || height > max_size {
            img.thumbnail(max_size, max_size)
        } else {
            img
        };

        Self::encode(img)
    }

    /// [`ImageThumbnailer::render`] on the blocking pool.
    pub async fn render_blocking(
        data: Vec<u8>,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError> {
        tokio::task::spawn_blocking(move || Self::render(&data, max_size))
            .await
            .map_err(|e| ConversionError::Decode(format!("thumbnail task failed: {}", e)))?
    }

    fn encode(img: DynamicImage) -> Result<Thumbnail, ConversionError> {
        let (width, height) = img.dimensions();
        let mut buf = Cursor::new(Vec::new());

        if img.color().has_alpha() {
            img.write_to(&mut buf, ImageFormat::Png)?;
            return Ok(Thumbnail {
                data: buf.into_inner(),
                content_type: "image/png",
                extension: "png",
                width,
                height,
            });
        }

        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))?;

        Ok(Thumbnail {
            data: buf.into_inner(),
            content_type: "image/jpeg",
            extension: "jpg",
            width,
            height,
        })
    }
}

#[async_trait]
impl Thumbnailer for ImageThumbnailer {
    async fn thumbnail(
        &self,
        data: &[u8],
        _source: &DetectedType,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError> {
        Self::render_blocking(data.to_vec(), max_size).await
    }

    fn name(&self) -> &'static str {
        "image"
    }
}
