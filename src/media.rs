//! Source images and the JPEG/PNG allow-list.

use crate::error::FileError;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

/// Image formats that can be embedded directly into a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Map a declared MIME type onto the allow-list.
    ///
    /// Matching ignores case and any `;`-separated parameters.
    pub fn from_mime(mime: &str) -> Option<ImageKind> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("image/jpeg") || essence.eq_ignore_ascii_case("image/jpg")
        {
            Some(ImageKind::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(ImageKind::Png)
        } else {
            None
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// A user-supplied file: its name, declared type and raw bytes.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Allow-list kind for the declared type, or `UnsupportedType`.
    pub fn kind(&self) -> Result<ImageKind, FileError> {
        ImageKind::from_mime(&self.mime_type).ok_or_else(|| FileError::UnsupportedType {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
        })
    }

    /// Pixel dimensions read from the image header.
    pub fn probe_dimensions(&self) -> Result<(u32, u32), FileError> {
        probe_dimensions(&self.name, &self.bytes)
    }
}

/// Read width and height without decoding the pixel data.
pub(crate) fn probe_dimensions(name: &str, bytes: &[u8]) -> Result<(u32, u32), FileError> {
    let decode_err = |detail: String| FileError::Decode {
        name: name.to_string(),
        detail,
    };

    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .into_dimensions()
        .map_err(|e| decode_err(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(decode_err(format!("empty image ({}x{})", width, height)));
    }
    Ok((width, height))
}

/// Guess the declared MIME type of a file from its extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
