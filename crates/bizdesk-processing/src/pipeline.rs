//! Picks the converter for a sniffed upload.

use std::time::Duration;

use bizdesk_core::Config;

use crate::command::ExternalTool;
use crate::error::ConversionError;
use crate::mime::{DetectedType, FileKind};
use crate::thumbnail::{
    ImageThumbnailer, OfficeThumbnailer, PdfThumbnailer, Thumbnail, Thumbnailer, VideoThumbnailer,
};

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    pub max_size: u32,
    pub pdftoppm_path: String,
    pub soffice_path: String,
    pub ffmpeg_path: String,
    pub timeout: Duration,
}

impl ThumbnailConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.thumbnails_enabled(),
            max_size: config.thumbnail_size(),
            pdftoppm_path: config.pdftoppm_path().to_string(),
            soffice_path: config.soffice_path().to_string(),
            ffmpeg_path: config.ffmpeg_path().to_string(),
            timeout: Duration::from_secs(config.converter_timeout_secs()),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 256,
            pdftoppm_path: "pdftoppm".to_string(),
            soffice_path: "soffice".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct ThumbnailPipeline {
    enabled: bool,
    max_size: u32,
    image: ImageThumbnailer,
    pdf: PdfThumbnailer,
    office: OfficeThumbnailer,
    video: VideoThumbnailer,
}

impl ThumbnailPipeline {
    pub fn new(config: ThumbnailConfig) -> Result<Self, ConversionError> {
        let pdf = PdfThumbnailer::new(ExternalTool::new(config.pdftoppm_path, config.timeout)?);
        let office = OfficeThumbnailer::new(
            ExternalTool::new(config.soffice_path, config.timeout)?,
            pdf.clone(),
        );
        let video = VideoThumbnailer::new(ExternalTool::new(config.ffmpeg_path, config.timeout)?);

        Ok(Self {
            enabled: config.enabled,
            max_size: config.max_size,
            image: ImageThumbnailer::new(),
            pdf,
            office,
            video,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn select(&self, detected: &DetectedType) -> Option<&dyn Thumbnailer> {
        match detected.kind {
            FileKind::Image if detected.is_decodable_image() => Some(&self.image),
            FileKind::Pdf => Some(&self.pdf),
            FileKind::Office => Some(&self.office),
            FileKind::Video => Some(&self.video),
            _ => None,
        }
    }

    /// `Ok(None)` when the type has no preview or previews are disabled.
    pub async fn generate(
        &self,
        detected: &DetectedType,
        data: &[u8],
    ) -> Result<Option<Thumbnail>, ConversionError> {
        if !self.enabled {
            return Ok(None);
        }
        let Some(thumbnailer) = self.select(detected) else {
            return Ok(None);
        };

        let start = std::time::Instant::now();
        let thumbnail = thumbnailer.thumbnail(data, detected, self.max_size).await?;

        tracing::debug!(
            converter = thumbnailer.name(),
            content_type = detected.mime,
            width = thumbnail.width,
            height = thumbnail.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Thumbnail generated"
        );

        Ok(Some(thumbnail))
    }
}
