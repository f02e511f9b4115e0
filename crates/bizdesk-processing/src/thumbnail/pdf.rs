use std::ffi::OsStr;

use async_trait::async_trait;

use super::{ImageThumbnailer, Thumbnail, Thumbnailer};
use crate::command::ExternalTool;
use crate::error::ConversionError;
use crate::mime::DetectedType;

/// Renders the first page with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdfThumbnailer {
    pdftoppm: ExternalTool,
}

impl PdfThumbnailer {
    pub fn new(pdftoppm: ExternalTool) -> Self {
        Self { pdftoppm }
    }

    /// Render page one of `pdf` to PNG bytes, longest side `max_size`.
    pub async fn render_first_page(
        &self,
        pdf: &[u8],
        max_size: u32,
    ) -> Result<Vec<u8>, ConversionError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.pdf");
        let prefix = workdir.path().join("page");
        tokio::fs::write(&input, pdf).await?;

        let scale = max_size.to_string();
        // -singlefile writes `<prefix>.png` without a page-number suffix.
        self.pdftoppm
            .run([
                OsStr::new("-png"),
                OsStr::new("-f"),
                OsStr::new("1"),
                OsStr::new("-l"),
                OsStr::new("1"),
                OsStr::new("-scale-to"),
                OsStr::new(&scale),
                OsStr::new("-singlefile"),
                input.as_os_str(),
                prefix.as_os_str(),
            ])
            .await?;

        let output = prefix.with_extension("png");
        match tokio::fs::read(&output).await {
            Ok(png) if !png.is_empty() => Ok(png),
            _ => Err(ConversionError::NoOutput(self.pdftoppm.path().to_string())),
        }
    }
}

#[async_trait]
impl Thumbnailer for PdfThumbnailer {
    async fn thumbnail(
        &self,
        data: &[u8],
        _source: &DetectedType,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError> {
        let page = self.render_first_page(data, max_size).await?;
        ImageThumbnailer::render_blocking(page, max_size).await
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}
