//! Image to PDF Library
//!
//! Core logic for turning a batch of JPEG/PNG images into one PDF. Shared
//! between the CLI and WASM targets.
//!
//! Each file is optionally downsampled and re-encoded as JPEG, then placed
//! on its own page: either centered on a fixed page (A4 by default) or on a
//! page the size of the image.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod assemble;
pub mod batch;
pub mod compress;
pub mod error;
pub mod layout;
pub mod media;
pub mod progress;
pub mod server;
#[cfg(not(target_arch = "wasm32"))]
pub mod transport;

pub use assemble::{PageImage, PdfAssembler};
pub use batch::{BatchSummary, ConversionJob, ConversionOutput, FileOutcome, FileStatus};
pub use compress::{compress_image, CompressedImage};
pub use error::{ConvertError, FileError};
pub use layout::{fit_to_page, PageSize, Placement};
pub use media::{ImageKind, SourceImage};
pub use progress::{NoopProgress, ProgressCallback};

/// Options for the compression stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOptions {
    /// Maximum output width in pixels; narrower images are never upscaled
    pub max_width: u32,
    /// JPEG quality factor in (0, 1]
    pub quality: f32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            quality: 0.8,
        }
    }
}

/// How each image is put on its page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageLayout {
    /// Fixed page size in millimetres. Images larger than the printable area
    /// are scaled down; all images are centered.
    Fixed { page: PageSize, margin: f64 },
    /// Page takes the image's pixel size, one pixel per point.
    Native,
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout::Fixed {
            page: PageSize::A4,
            margin: 10.0,
        }
    }
}

/// Options for a conversion job
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Compression stage settings; `None` embeds the source bytes as-is
    pub compression: Option<CompressionOptions>,
    pub layout: PageLayout,
    /// Compress PDF streams (reduces file size)
    pub compress_streams: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            compression: Some(CompressionOptions::default()),
            layout: PageLayout::default(),
            compress_streams: true,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<(), ConvertError> {
        if let Some(c) = &self.compression {
            if c.max_width == 0 {
                return Err(ConvertError::InvalidOptions(
                    "max width must be greater than 0".into(),
                ));
            }
            if !(c.quality > 0.0 && c.quality <= 1.0) {
                return Err(ConvertError::InvalidOptions(format!(
                    "quality must be in (0, 1], got {}",
                    c.quality
                )));
            }
        }
        if let PageLayout::Fixed { page, margin } = self.layout {
            if !(margin >= 0.0 && 2.0 * margin < page.width && 2.0 * margin < page.height) {
                return Err(ConvertError::InvalidOptions(format!(
                    "margin {} leaves no printable area on a {}x{} page",
                    margin, page.width, page.height
                )));
            }
        }
        Ok(())
    }
}

/// Convert an ordered list of images into PDF bytes.
pub fn convert_images(
    files: Vec<SourceImage>,
    options: &ConvertOptions,
) -> Result<ConversionOutput, ConvertError> {
    let mut job = ConversionJob::new(options.clone());
    for file in files {
        job.push(file);
    }
    job.run()
}

/// Download name for a freshly generated document.
pub fn default_download_name() -> String {
    format!("converted_images_{}.pdf", now_ms())
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use crate::media::mime_from_path;
    use std::path::Path;

    /// Read a file from disk, declaring its type from the extension.
    pub fn load_source_image(path: &Path) -> Result<SourceImage, ConvertError> {
        let bytes = std::fs::read(path).map_err(|source| ConvertError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(SourceImage::new(name, mime_from_path(path), bytes))
    }

    /// Convert image files into a PDF written to `output_path`.
    pub fn convert_files(
        input_paths: &[impl AsRef<Path>],
        output_path: &Path,
        options: &ConvertOptions,
        progress: std::sync::Arc<dyn ProgressCallback>,
    ) -> Result<ConversionOutput, ConvertError> {
        let mut job = ConversionJob::new(options.clone()).with_progress(progress);
        for path in input_paths {
            job.push(load_source_image(path.as_ref())?);
        }

        let output = job.run()?;
        std::fs::write(output_path, &output.pdf).map_err(|source| ConvertError::Io {
            path: output_path.to_path_buf(),
            source,
        })?;
        Ok(output)
    }
}
