//! Stand-ins for the external converters, written as shell scripts.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Write a PNG fixture into `dir` and return its path.
pub(crate) fn png_fixture(dir: &Path, width: u32, height: u32) -> PathBuf {
    let path = dir.join("fixture.png");
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    path
}

/// Install an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub(crate) fn install(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}
