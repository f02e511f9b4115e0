//! Content-sniffing MIME detection
//!
//! The type of an upload is decided from its leading bytes. The filename
//! extension is only consulted to tell apart formats that share a container
//! (OOXML vs plain ZIP, legacy Office documents inside OLE2, CSV vs text).
//! Client-declared content types are ignored.

use serde::Serialize;
use std::path::Path;

/// Broad family of a file, used to pick a preview converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Office,
    Video,
    Audio,
    Archive,
    Text,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedType {
    pub mime: &'static str,
    /// Canonical extension for storage keys.
    pub extension: &'static str,
    pub kind: FileKind,
}

impl DetectedType {
    const fn new(mime: &'static str, extension: &'static str, kind: FileKind) -> Self {
        Self {
            mime,
            extension,
            kind,
        }
    }

    /// Raster formats the `image` crate decodes.
    pub fn is_decodable_image(&self) -> bool {
        matches!(
            self.mime,
            "image/jpeg"
                | "image/png"
                | "image/gif"
                | "image/webp"
                | "image/bmp"
                | "image/tiff"
                | "image/x-icon"
        )
    }
}

const OCTET_STREAM: DetectedType =
    DetectedType::new("application/octet-stream", "bin", FileKind::Other);

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn at(data: &[u8], offset: usize, magic: &[u8]) -> bool {
    data.len() >= offset + magic.len() && &data[offset..offset + magic.len()] == magic
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Detect the type of `data`; `filename` only disambiguates containers.
pub fn sniff(data: &[u8], filename: &str) -> DetectedType {
    let ext = extension_of(filename);
    let ext = ext.as_deref();

    if let Some(detected) = sniff_image(data) {
        return detected;
    }
    if at(data, 0, b"%PDF-") {
        return DetectedType::new("application/pdf", "pdf", FileKind::Pdf);
    }
    if at(data, 0, b"PK\x03\x04") || at(data, 0, b"PK\x05\x06") {
        return sniff_zip(data, ext);
    }
    if at(data, 0, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return sniff_ole(ext);
    }
    if at(data, 0, b"{\\rtf") {
        return DetectedType::new("application/rtf", "rtf", FileKind::Office);
    }
    if let Some(detected) = sniff_av(data, ext) {
        return detected;
    }
    if let Some(detected) = sniff_binary(data) {
        return detected;
    }
    sniff_text(data, ext).unwrap_or(OCTET_STREAM)
}

fn sniff_image(data: &[u8]) -> Option<DetectedType> {
    let detected = if at(data, 0, &[0xFF, 0xD8, 0xFF]) {
        DetectedType::new("image/jpeg", "jpg", FileKind::Image)
    } else if at(data, 0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        DetectedType::new("image/png", "png", FileKind::Image)
    } else if at(data, 0, b"GIF87a") || at(data, 0, b"GIF89a") {
        DetectedType::new("image/gif", "gif", FileKind::Image)
    } else if at(data, 0, b"RIFF") && at(data, 8, b"WEBP") {
        DetectedType::new("image/webp", "webp", FileKind::Image)
    } else if at(data, 0, b"BM") && data.len() >= 26 && at(data, 6, &[0, 0, 0, 0]) {
        DetectedType::new("image/bmp", "bmp", FileKind::Image)
    } else if at(data, 0, b"II*\0") || at(data, 0, b"MM\0*") {
        DetectedType::new("image/tiff", "tiff", FileKind::Image)
    } else if at(data, 0, &[0, 0, 1, 0]) && data.len() >= 22 {
        DetectedType::new("image/x-icon", "ico", FileKind::Image)
    } else if at(data, 4, b"ftyp") {
        match data.get(8..12)? {
            b"heic" | b"heix" | b"mif1" | b"msf1" => {
                DetectedType::new("image/heic", "heic", FileKind::Image)
            }
            b"avif" | b"avis" => DetectedType::new("image/avif", "avif", FileKind::Image),
            _ => return None,
        }
    } else {
        return None;
    };
    Some(detected)
}

fn sniff_zip(data: &[u8], ext: Option<&str>) -> DetectedType {
    const DOCX: DetectedType = DetectedType::new(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
        FileKind::Office,
    );
    const XLSX: DetectedType = DetectedType::new(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
        FileKind::Office,
    );
    const PPTX: DetectedType = DetectedType::new(
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
        FileKind::Office,
    );
    const ODT: DetectedType = DetectedType::new(
        "application/vnd.oasis.opendocument.text",
        "odt",
        FileKind::Office,
    );
    const ODS: DetectedType = DetectedType::new(
        "application/vnd.oasis.opendocument.spreadsheet",
        "ods",
        FileKind::Office,
    );
    const ODP: DetectedType = DetectedType::new(
        "application/vnd.oasis.opendocument.presentation",
        "odp",
        FileKind::Office,
    );

    match ext {
        Some("docx") => return DOCX,
        Some("xlsx") => return XLSX,
        Some("pptx") => return PPTX,
        Some("odt") => return ODT,
        Some("ods") => return ODS,
        Some("odp") => return ODP,
        _ => {}
    }

    // OpenDocument stores an uncompressed `mimetype` entry first.
    if at(data, 30, b"mimetype") {
        let head = &data[38..data.len().min(38 + 64)];
        if head.starts_with(b"application/vnd.oasis.opendocument.text") {
            return ODT;
        }
        if head.starts_with(b"application/vnd.oasis.opendocument.spreadsheet") {
            return ODS;
        }
        if head.starts_with(b"application/vnd.oasis.opendocument.presentation") {
            return ODP;
        }
    }

    // OOXML part names live in the local file headers near the start.
    let head = &data[..data.len().min(4096)];
    if contains(head, b"[Content_Types].xml") || contains(head, b"_rels/.rels") {
        if contains(head, b"word/") {
            return DOCX;
        }
        if contains(head, b"xl/") {
            return XLSX;
        }
        if contains(head, b"ppt/") {
            return PPTX;
        }
    }

    DetectedType::new("application/zip", "zip", FileKind::Archive)
}

fn sniff_ole(ext: Option<&str>) -> DetectedType {
    match ext {
        Some("doc") => DetectedType::new("application/msword", "doc", FileKind::Office),
        Some("xls") => DetectedType::new("application/vnd.ms-excel", "xls", FileKind::Office),
        Some("ppt") => {
            DetectedType::new("application/vnd.ms-powerpoint", "ppt", FileKind::Office)
        }
        _ => DetectedType::new("application/x-ole-storage", "ole", FileKind::Other),
    }
}

fn sniff_av(data: &[u8], ext: Option<&str>) -> Option<DetectedType> {
    let detected = if at(data, 4, b"ftyp") {
        match data.get(8..12)? {
            b"qt  " => DetectedType::new("video/quicktime", "mov", FileKind::Video),
            b"M4A " | b"M4B " => DetectedType::new("audio/mp4", "m4a", FileKind::Audio),
            b"3gp4" | b"3gp5" | b"3gp6" => DetectedType::new("video/3gpp", "3gp", FileKind::Video),
            _ => DetectedType::new("video/mp4", "mp4", FileKind::Video),
        }
    } else if at(data, 0, &[0x1A, 0x45, 0xDF, 0xA3]) {
        let head = &data[..data.len().min(64)];
        if contains(head, b"webm") || ext == Some("webm") {
            DetectedType::new("video/webm", "webm", FileKind::Video)
        } else {
            DetectedType::new("video/x-matroska", "mkv", FileKind::Video)
        }
    } else if at(data, 0, b"RIFF") && at(data, 8, b"AVI ") {
        DetectedType::new("video/x-msvideo", "avi", FileKind::Video)
    } else if at(data, 0, b"RIFF") && at(data, 8, b"WAVE") {
        DetectedType::new("audio/wav", "wav", FileKind::Audio)
    } else if at(data, 0, &[0x00, 0x00, 0x01, 0xBA]) || at(data, 0, &[0x00, 0x00, 0x01, 0xB3]) {
        DetectedType::new("video/mpeg", "mpg", FileKind::Video)
    } else if at(data, 0, b"OggS") {
        if ext == Some("ogv") {
            DetectedType::new("video/ogg", "ogv", FileKind::Video)
        } else {
            DetectedType::new("audio/ogg", "ogg", FileKind::Audio)
        }
    } else if at(data, 0, b"fLaC") {
        DetectedType::new("audio/flac", "flac", FileKind::Audio)
    } else if at(data, 0, b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0)
    {
        DetectedType::new("audio/mpeg", "mp3", FileKind::Audio)
    } else {
        return None;
    };
    Some(detected)
}

fn sniff_binary(data: &[u8]) -> Option<DetectedType> {
    let detected = if at(data, 0, &[0x1F, 0x8B]) {
        DetectedType::new("application/gzip", "gz", FileKind::Archive)
    } else if at(data, 0, &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]) {
        DetectedType::new("application/x-7z-compressed", "7z", FileKind::Archive)
    } else if at(data, 0, b"Rar!\x1A\x07") {
        DetectedType::new("application/vnd.rar", "rar", FileKind::Archive)
    } else if at(data, 0, b"MZ") {
        DetectedType::new("application/x-msdownload", "exe", FileKind::Other)
    } else if at(data, 0, b"\x7FELF") {
        DetectedType::new("application/x-executable", "elf", FileKind::Other)
    } else {
        return None;
    };
    Some(detected)
}

fn sniff_text(data: &[u8], ext: Option<&str>) -> Option<DetectedType> {
    let head = &data[..data.len().min(8192)];
    match std::str::from_utf8(head) {
        Ok(_) => {}
        // A multi-byte character cut by the 8 KiB window is still text.
        Err(e) if e.error_len().is_none() && data.len() > head.len() => {}
        Err(_) => return None,
    }

    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && trimmed.contains("<svg"))
    {
        return Some(DetectedType::new("image/svg+xml", "svg", FileKind::Image));
    }
    if trimmed.starts_with("#!") {
        return Some(DetectedType::new("application/x-sh", "sh", FileKind::Other));
    }

    let detected = match ext {
        Some("csv") => DetectedType::new("text/csv", "csv", FileKind::Text),
        Some("md") | Some("markdown") => DetectedType::new("text/markdown", "md", FileKind::Text),
        Some("json") => DetectedType::new("application/json", "json", FileKind::Text),
        Some("html") | Some("htm") => DetectedType::new("text/html", "html", FileKind::Text),
        Some("xml") => DetectedType::new("application/xml", "xml", FileKind::Text),
        _ if trimmed.starts_with("<?xml") => {
            DetectedType::new("application/xml", "xml", FileKind::Text)
        }
        _ => DetectedType::new("text/plain", "txt", FileKind::Text),
    };
    Some(detected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.resize(64, 0);
        v
    }

    #[test]
    fn images() {
        assert_eq!(sniff(&padded(&[0xFF, 0xD8, 0xFF, 0xE0]), "x").mime, "image/jpeg");
        assert_eq!(
            sniff(&padded(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]), "x").mime,
            "image/png"
        );
        assert_eq!(sniff(&padded(b"GIF89a"), "x").mime, "image/gif");
        assert_eq!(sniff(&padded(b"RIFF\0\0\0\0WEBPVP8 "), "x").mime, "image/webp");
        assert_eq!(sniff(&padded(b"II*\0"), "x").mime, "image/tiff");
        assert_eq!(sniff(&padded(b"\0\0\0\x18ftypheic"), "x").mime, "image/heic");
    }

    #[test]
    fn declared_name_does_not_override_signature() {
        let detected = sniff(&padded(b"%PDF-1.7"), "photo.jpg");
        assert_eq!(detected.mime, "application/pdf");
        assert_eq!(detected.kind, FileKind::Pdf);
        assert_eq!(detected.extension, "pdf");
    }

    #[test]
    fn zip_containers() {
        let zip = padded(b"PK\x03\x04");
        assert_eq!(sniff(&zip, "report.DOCX").extension, "docx");
        assert_eq!(sniff(&zip, "sheet.xlsx").kind, FileKind::Office);
        assert_eq!(sniff(&zip, "backup.zip").mime, "application/zip");
        assert_eq!(sniff(&zip, "noext").kind, FileKind::Archive);

        let mut odt = b"PK\x03\x04".to_vec();
        odt.resize(30, 0);
        odt.extend_from_slice(b"mimetypeapplication/vnd.oasis.opendocument.text");
        assert_eq!(sniff(&odt, "upload").extension, "odt");

        let mut docx = b"PK\x03\x04".to_vec();
        docx.resize(30, 0);
        docx.extend_from_slice(b"[Content_Types].xml....word/document.xml");
        assert_eq!(sniff(&docx, "upload").extension, "docx");
    }

    #[test]
    fn legacy_office() {
        let ole = padded(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
        assert_eq!(sniff(&ole, "devis.doc").mime, "application/msword");
        assert_eq!(sniff(&ole, "stock.xls").kind, FileKind::Office);
        assert_eq!(sniff(&ole, "thing").kind, FileKind::Other);
    }

    #[test]
    fn video_and_audio() {
        assert_eq!(sniff(&padded(b"\0\0\0\x20ftypisom"), "x").mime, "video/mp4");
        assert_eq!(sniff(&padded(b"\0\0\0\x14ftypqt  "), "x").mime, "video/quicktime");
        assert_eq!(sniff(&padded(b"\0\0\0\x20ftypM4A "), "x").kind, FileKind::Audio);
        assert_eq!(
            sniff(&padded(&[0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x84, b'w', b'e', b'b', b'm']), "x").mime,
            "video/webm"
        );
        assert_eq!(sniff(&padded(&[0x1A, 0x45, 0xDF, 0xA3]), "x").mime, "video/x-matroska");
        assert_eq!(sniff(&padded(b"RIFF\0\0\0\0AVI LIST"), "x").kind, FileKind::Video);
        assert_eq!(sniff(&padded(b"RIFF\0\0\0\0WAVEfmt "), "x").mime, "audio/wav");
        assert_eq!(sniff(&padded(b"ID3\x04"), "x").mime, "audio/mpeg");
        assert_eq!(sniff(&padded(b"OggS"), "clip.ogv").kind, FileKind::Video);
    }

    #[test]
    fn text_formats() {
        assert_eq!(sniff(b"name;total\nacme;12\n", "export.csv").mime, "text/csv");
        assert_eq!(sniff(b"hello", "notes").mime, "text/plain");
        assert_eq!(sniff("\u{feff}<svg xmlns=\"\"/>".as_bytes(), "logo").mime, "image/svg+xml");
        assert_eq!(
            sniff(b"<?xml version=\"1.0\"?><svg></svg>", "logo").extension,
            "svg"
        );
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><invoice/>", "x").mime, "application/xml");
        assert_eq!(sniff(b"#!/bin/sh\nrm -rf /", "run.txt").mime, "application/x-sh");
    }

    #[test]
    fn utf8_cut_at_window_boundary_is_text() {
        let mut data = vec![b'a'; 8191];
        data.extend_from_slice("é".as_bytes());
        assert_eq!(sniff(&data, "x").kind, FileKind::Text);
    }

    #[test]
    fn executables_and_unknown_binary() {
        assert_eq!(sniff(&padded(b"MZ\x90\0"), "setup.pdf").mime, "application/x-msdownload");
        assert_eq!(sniff(&padded(b"\x7FELF"), "x").mime, "application/x-executable");
        assert_eq!(sniff(&[0x00, 0x9F, 0x92, 0x96], "x"), OCTET_STREAM);
    }

    #[test]
    fn decodable_images() {
        assert!(sniff(&padded(&[0xFF, 0xD8, 0xFF]), "x").is_decodable_image());
        assert!(!sniff(b"<svg/>", "x").is_decodable_image());
        assert!(!sniff(&padded(b"\0\0\0\x18ftypavif"), "x").is_decodable_image());
    }
}
