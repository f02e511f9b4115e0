use std::path::Path;

use crate::mime::DetectedType;

/// Executable content is never accepted, whatever the allowlist says.
const DENIED_MIME_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-executable",
    "application/x-sh",
];

const DENIED_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "sh", "msi", "dll", "com", "scr"];

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File type {content_type} is not accepted")]
    Denied { content_type: String },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    NotAllowed {
        content_type: String,
        allowed: Vec<String>,
    },
}

/// Upload checks run before anything is stored.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: usize,
    /// Empty means every type outside the deny list.
    allowed_mime_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: usize, allowed_mime_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_mime_types: allowed_mime_types
                .into_iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::InvalidFilename(
                "filename is empty".to_string(),
            ));
        }
        if filename.contains("..") {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        if filename.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidFilename(
                "filename contains control characters".to_string(),
            ));
        }
        if filename.len() > 4 * MAX_FILENAME_LEN {
            return Err(ValidationError::InvalidFilename(
                "filename is too long".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the sniffed type (and the declared extension) against the policy.
    pub fn validate_type(
        &self,
        detected: &DetectedType,
        filename: &str,
    ) -> Result<(), ValidationError> {
        let declared_ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let denied_ext = declared_ext
            .as_deref()
            .is_some_and(|ext| DENIED_EXTENSIONS.contains(&ext));

        if DENIED_MIME_TYPES.contains(&detected.mime) || denied_ext {
            return Err(ValidationError::Denied {
                content_type: detected.mime.to_string(),
            });
        }

        if !self.allowed_mime_types.is_empty()
            && !self.allowed_mime_types.iter().any(|m| m == detected.mime)
        {
            return Err(ValidationError::NotAllowed {
                content_type: detected.mime.to_string(),
                allowed: self.allowed_mime_types.clone(),
            });
        }

        Ok(())
    }

    pub fn validate_all(
        &self,
        filename: &str,
        detected: &DetectedType,
        size: usize,
    ) -> Result<(), ValidationError> {
        self.validate_file_size(size)?;
        self.validate_filename(filename)?;
        self.validate_type(detected, filename)?;
        Ok(())
    }
}

/// Keep the final path component, restricted to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    // Windows clients send backslash paths.
    let base = base.rsplit('\\').next().unwrap_or(base);

    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let s = s.trim_start_matches('.');
    if s.replace('_', "").is_empty() {
        "file".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::sniff;

    fn test_validator() -> FileValidator {
        FileValidator::new(1024 * 1024, vec![])
    }

    #[test]
    fn test_validate_file_size_ok() {
        assert!(test_validator().validate_file_size(512 * 1024).is_ok());
    }

    #[test]
    fn test_validate_file_size_too_large() {
        assert!(matches!(
            test_validator().validate_file_size(2 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_file_size_empty() {
        assert!(matches!(
            test_validator().validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_validate_filename() {
        let v = test_validator();
        assert!(v.validate_filename("facture 2024-03.pdf").is_ok());
        assert!(v.validate_filename("  ").is_err());
        assert!(v.validate_filename("../../etc/passwd").is_err());
        assert!(v.validate_filename("bad\u{0}name.pdf").is_err());
    }

    #[test]
    fn test_executables_are_denied() {
        let v = test_validator();
        let exe = sniff(b"MZ\x90\0\x03\0\0\0", "setup.exe");
        assert!(matches!(
            v.validate_type(&exe, "setup.exe"),
            Err(ValidationError::Denied { .. })
        ));

        // Harmless content under a dangerous name is still refused.
        let text = sniff(b"echo hi", "run.bat");
        assert!(v.validate_type(&text, "run.bat").is_err());
    }

    #[test]
    fn test_allowlist() {
        let v = FileValidator::new(1024, vec!["application/PDF".to_string()]);
        let pdf = sniff(b"%PDF-1.4", "a.pdf");
        let txt = sniff(b"hello", "a.txt");
        assert!(v.validate_type(&pdf, "a.pdf").is_ok());
        assert!(matches!(
            v.validate_type(&txt, "a.txt"),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_validate_all_fails_on_size() {
        let v = test_validator();
        let pdf = sniff(b"%PDF-1.4", "a.pdf");
        assert!(v.validate_all("a.pdf", &pdf, 8).is_ok());
        assert!(v.validate_all("a.pdf", &pdf, 2 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("facture mars.pdf"), "facture_mars.pdf");
        assert_eq!(sanitize_filename("/tmp/upload/report.xlsx"), "report.xlsx");
        assert_eq!(sanitize_filename("C:\\Users\\me\\devis.docx"), "devis.docx");
        assert_eq!(sanitize_filename(".htaccess"), "htaccess");
        assert_eq!(sanitize_filename("été.png"), "_t_.png");
        assert_eq!(sanitize_filename("???"), "file");
        assert_eq!(sanitize_filename(&"a".repeat(400)).len(), 255);
    }
}
