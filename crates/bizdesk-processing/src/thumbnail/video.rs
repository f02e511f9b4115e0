use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;

use super::{ImageThumbnailer, Thumbnail, Thumbnailer};
use crate::command::ExternalTool;
use crate::error::ConversionError;
use crate::mime::DetectedType;

/// Grabs a single frame with ffmpeg.
#[derive(Debug, Clone)]
pub struct VideoThumbnailer {
    ffmpeg: ExternalTool,
}

impl VideoThumbnailer {
    pub fn new(ffmpeg: ExternalTool) -> Self {
        Self { ffmpeg }
    }

    async fn grab_frame(
        &self,
        input: &Path,
        output: &Path,
        seek: &str,
    ) -> Result<Option<Vec<u8>>, ConversionError> {
        let _ = tokio::fs::remove_file(output).await;
        self.ffmpeg
            .run([
                OsStr::new("-hide_banner"),
                OsStr::new("-loglevel"),
                OsStr::new("error"),
                OsStr::new("-ss"),
                OsStr::new(seek),
                OsStr::new("-i"),
                input.as_os_str(),
                OsStr::new("-frames:v"),
                OsStr::new("1"),
                OsStr::new("-y"),
                output.as_os_str(),
            ])
            .await?;

        match tokio::fs::read(output).await {
            Ok(frame) if !frame.is_empty() => Ok(Some(frame)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Thumbnailer for VideoThumbnailer {
    async fn thumbnail(
        &self,
        data: &[u8],
        source: &DetectedType,
        max_size: u32,
    ) -> Result<Thumbnail, ConversionError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(format!("input.{}", source.extension));
        let output = workdir.path().join("frame.png");
        tokio::fs::write(&input, data).await?;

        // Clips shorter than a second have nothing at 00:01, fall back to the first frame.
        let frame = match self.grab_frame(&input, &output, "1").await {
            Ok(Some(frame)) => Some(frame),
            Ok(None) | Err(ConversionError::ToolFailed { .. }) => {
                tracing::debug!("No frame at 1s, retrying at 0s");
                self.grab_frame(&input, &output, "0").await?
            }
            Err(e) => return Err(e),
        };

        let frame = frame.ok_or_else(|| ConversionError::NoOutput(self.ffmpeg.path().to_string()))?;
        ImageThumbnailer::render_blocking(frame, max_size).await
    }

    fn name(&self) -> &'static str {
        "video"
    }
}
