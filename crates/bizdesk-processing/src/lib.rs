//! Bizdesk upload processing
//!
//! Everything that happens to an uploaded file before it is persisted:
//! content sniffing, validation and preview generation by the external
//! converters (`pdftoppm`, `soffice`, `ffmpeg`) or the `image` crate.

pub mod command;
pub mod error;
pub mod mime;
pub mod pipeline;
pub mod thumbnail;
pub mod validator;

pub use error::ConversionError;
pub use mime::{sniff, DetectedType, FileKind};
pub use pipeline::{ThumbnailConfig, ThumbnailPipeline};
pub use thumbnail::{Thumbnail, Thumbnailer};
pub use validator::{sanitize_filename, FileValidator, ValidationError};
