use std::time::Duration;

/// Failures while turning an upload into a preview.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid tool path '{0}': contains dangerous characters")]
    InvalidToolPath(String),

    #[error("Failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{0} produced no output")]
    NoOutput(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ConversionError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => ConversionError::Encode(e.to_string()),
            other => ConversionError::Decode(other.to_string()),
        }
    }
}
