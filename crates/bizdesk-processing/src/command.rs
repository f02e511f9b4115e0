//! Bounded execution of external conversion tools.

use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::ConversionError;

const DANGEROUS_CHARS: [char; 11] = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];

/// Longest stderr excerpt kept in errors.
const MAX_STDERR_CHARS: usize = 2000;

/// An external binary invoked with a hard deadline.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    path: String,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Result<Self, ConversionError> {
        let path = path.into();
        if path.is_empty() || path.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
            return Err(ConversionError::InvalidToolPath(path));
        }
        Ok(Self { path, timeout })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run to completion; the child is killed when the deadline passes.
    pub async fn run<I, S>(&self, args: I) -> Result<Output, ConversionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let start = Instant::now();

        let child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                tool: self.path.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    tool = %self.path,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "External tool timed out, killed"
                );
                return Err(ConversionError::Timeout {
                    tool: self.path.clone(),
                    timeout: self.timeout,
                });
            }
        };

        tracing::debug!(
            tool = %self.path,
            status = %output.status,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "External tool finished"
        );

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(ConversionError::ToolFailed {
                tool: self.path.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(ExternalTool::new("ffmpeg; rm -rf /", Duration::from_secs(1)).is_err());
        assert!(ExternalTool::new("", Duration::from_secs(1)).is_err());
        assert!(ExternalTool::new("/usr/bin/pdftoppm", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let tool = ExternalTool::new("bizdesk-no-such-tool", Duration::from_secs(5)).unwrap();
        let err = tool.run(["--version"]).await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let tool = ExternalTool::new("sleep", Duration::from_millis(200)).unwrap();
        let start = Instant::now();
        let err = tool.run(["10"]).await.unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_reports_stderr() {
        let tool = ExternalTool::new("sh", Duration::from_secs(5)).unwrap();
        let err = tool
            .run(["-c", "echo 'cannot open input' >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            ConversionError::ToolFailed { stderr, .. } => {
                assert_eq!(stderr, "cannot open input")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
