use std::ffi::OsStr;

use async_trait::async_trait;

use super::{ImageThumbnailer, PdfThumbnailer, Thumbnail, Thumbnailer};
use crate::command::ExternalTool;
use crate::error::ConversionError;
use crate::mime::DetectedType;

/// Converts office documents to PDF with LibreOffice, then renders page one.
#[derive(Debug, Clone)]
pub struct OfficeThumbnailer {
    soffice: ExternalTool,
    pdf: PdfThumbnailer,
}

impl OfficeThumbnailer {
    pub fn new(soffice: ExternalTool, pdf: PdfThumbnailer) -> Self {
        Self { soffice, pdf }
    }

    async fn convert_to_pdf(
        &self,
        data: &[u8],
        extension: &str,
    ) -> Result<Vec<u8>, ConversionError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(format!("input.{}", extension));
        let outdir = workdir.path().join("out");
        // A private profile lets several conversions run side by side.
        let profile = workdir.path().join("profile");
        tokio::fs::write(&input, data).await?;

        let profile_arg = format!("-env:UserInstallation=file://{}", profile.display());
        self.soffice
            .run([
                OsStr::new("--headless"),
                OsStr::new("--norestore"),
                OsStr::new("--nolockcheck"),
                OsStr::new(&profile_arg),
                OsStr::new("--convert-to"),
                OsStr::new("pdf"),
                OsStr::new("--outdir"),
                outdir.as_os_str(),
                input.as_os_str(),
            ])
            .await?;

        match tokio::fs::read(outdir.join("input.pdf")).await {
            Ok(pdf) if !pdf.is_empty() => Ok(pdf),
            _ => Err(ConversionError::NoOutput(self.soffice.path().to_string())),
        }
    }
}

#[async_trait]
impl Thumbnailer for OfficeThumbnailer {
    async fn thumbnail(
        &self,
        data: &[u8],
        source: &DetectedType,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError> {
        let pdf = self.convert_to_pdf(data, source.extension).await?;
        let page = self.pdf.render_first_page(&pdf, max_size).await?;
        ImageThumbnailer::render_blocking(page, max_size).await
    }

    fn name(&self) -> &'static str {
        "office"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mime::sniff;
    use crate::thumbnail::fake_tool::{install, png_fixture};
    use std::time::Duration;

    #[tokio::test]
    async fn converts_through_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = png_fixture(dir.path(), 400, 400);
        // Fake soffice: find the value after --outdir and drop a PDF there.
        let soffice = install(
            dir.path(),
            "soffice",
            "while [ $# -gt 0 ]; do\n  case \"$1\" in\n    --outdir) shift; out=\"$1\";;\n  esac\n  last=\"$1\"; shift\ndone\nmkdir -p \"$out\"\nprintf '%%PDF-1.7' > \"$out/input.pdf\"\necho \"$last\" > \"$out/../input.log\"",
        );
        let pdftoppm = install(
            dir.path(),
            "pdftoppm",
            &format!("for last; do :; done\ncp {} \"$last.png\"", fixture.display()),
        );

        let timeout = Duration::from_secs(10);
        let thumbnailer = OfficeThumbnailer::new(
            ExternalTool::new(soffice, timeout).unwrap(),
            PdfThumbnailer::new(ExternalTool::new(pdftoppm, timeout).unwrap()),
        );

        let mut docx = b"PK\x03\x04".to_vec();
        docx.resize(64, 0);
        let thumb = thumbnailer
            .thumbnail(&docx, &sniff(&docx, "devis.docx"), 128)
            .await
            .unwrap();

        assert_eq!((thumb.width, thumb.height), (128, 128));
    }

    #[tokio::test]
    async fn conversion_without_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let soffice = install(dir.path(), "soffice", "exit 0");
        let pdftoppm = install(dir.path(), "pdftoppm", "exit 0");
        let timeout = Duration::from_secs(10);
        let thumbnailer = OfficeThumbnailer::new(
            ExternalTool::new(soffice, timeout).unwrap(),
            PdfThumbnailer::new(ExternalTool::new(pdftoppm, timeout).unwrap()),
        );

        let err = thumbnailer
            .thumbnail(b"{\\rtf1}", &sniff(b"{\\rtf1}", "note.rtf"), 128)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NoOutput(_)));
    }
}
