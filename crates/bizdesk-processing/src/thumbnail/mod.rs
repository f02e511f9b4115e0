//! Preview generation
//!
//! Each converter turns the raw bytes of one family of formats into a small
//! raster preview. Non-image converters render a first page or frame with an
//! external tool and hand the result to [`ImageThumbnailer`] for resizing.

mod office;
mod pdf;
mod raster;
mod video;

#[cfg(test)]
pub(crate) mod fake_tool;

pub use office::OfficeThumbnailer;
pub use pdf::PdfThumbnailer;
pub use raster::ImageThumbnailer;
pub use video::VideoThumbnailer;

use async_trait::async_trait;

use crate::error::ConversionError;
use crate::mime::DetectedType;

/// An encoded preview image.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// Render a preview fitting in a `max_size` x `max_size` box.
    async fn thumbnail(
        &self,
        data: &[u8],
        source: &DetectedType,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError>;

    fn name(&self) -> &'static str;
}
