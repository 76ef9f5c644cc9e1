//! WebAssembly bindings for the browser page

use crate::batch::ConversionJob;
use crate::error::FileError;
use crate::progress::ProgressCallback;
use crate::{
    compress, default_download_name, fit_to_page, CompressionOptions, ConvertOptions, PageLayout,
    PageSize, SourceImage,
};
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Reports per-file failures in the browser console.
struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_file_skipped(&self, _index: usize, error: &FileError) {
        web_sys::console::info_1(&JsValue::from_str(&error.to_string()));
    }

    fn on_file_error(&self, _index: usize, error: &FileError) {
        web_sys::console::error_1(&JsValue::from_str(&error.to_string()));
    }
}

/// Downsample and re-encode one image as JPEG
///
/// # Arguments
/// * `bytes` - The image file contents
/// * `name` - File name, kept on the result
/// * `mime_type` - Declared type of the file
/// * `max_width` - Maximum width in pixels (default: 1024)
/// * `quality` - JPEG quality in (0, 1] (default: 0.8)
#[wasm_bindgen]
pub fn compress_image(
    bytes: &[u8],
    name: String,
    mime_type: String,
    max_width: Option<u32>,
    quality: Option<f32>,
) -> Result<CompressedImageJs, JsError> {
    let options = CompressionOptions {
        max_width: max_width.unwrap_or(1024),
        quality: quality.unwrap_or(0.8),
    };
    ConvertOptions {
        compression: Some(options),
        ..Default::default()
    }
    .validate()
    .map_err(|e| JsError::new(&e.to_string()))?;

    let source = SourceImage::new(name, mime_type, bytes.to_vec());
    let compressed =
        compress::compress_image(&source, &options).map_err(|e| JsError::new(&e.to_string()))?;

    Ok(CompressedImageJs {
        name: compressed.name,
        bytes: compressed.bytes,
        width: compressed.width,
        height: compressed.height,
        created_at: compressed.created_at_ms as f64,
    })
}

/// Convert images to a PDF
///
/// # Arguments
/// * `files` - Array of `Uint8Array`, one per image, in page order
/// * `names` - File names, same order
/// * `mime_types` - Declared types, same order; non JPEG/PNG files are skipped
/// * `compress_images` - Run the compression stage first (default: true)
/// * `max_width` - Maximum width in pixels (default: 1024)
/// * `quality` - JPEG quality in (0, 1] (default: 0.8)
/// * `native_size` - Size each page to its image instead of A4 (default: false)
/// * `margin_mm` - A4 margin in millimetres (default: 10)
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn images_to_pdf(
    files: js_sys::Array,
    names: Vec<String>,
    mime_types: Vec<String>,
    compress_images: Option<bool>,
    max_width: Option<u32>,
    quality: Option<f32>,
    native_size: Option<bool>,
    margin_mm: Option<f64>,
) -> Result<ConversionResultJs, JsError> {
    if files.length() as usize != names.len() || names.len() != mime_types.len() {
        return Err(JsError::new("files, names and mime_types must have the same length"));
    }

    let options = ConvertOptions {
        compression: compress_images.unwrap_or(true).then(|| CompressionOptions {
            max_width: max_width.unwrap_or(1024),
            quality: quality.unwrap_or(0.8),
        }),
        layout: if native_size.unwrap_or(false) {
            PageLayout::Native
        } else {
            PageLayout::Fixed {
                page: PageSize::A4,
                margin: margin_mm.unwrap_or(10.0),
            }
        },
        compress_streams: true,
    };

    let mut job = ConversionJob::new(options).with_progress(Arc::new(ConsoleProgress));
    for ((file, name), mime_type) in files.iter().zip(names).zip(mime_types) {
        let bytes = js_sys::Uint8Array::new(&file).to_vec();
        job.push(SourceImage::new(name, mime_type, bytes));
    }

    let output = job.run().map_err(|e| JsError::new(&e.to_string()))?;

    let summary_json = serde_json::json!({
        "summary": output.summary,
        "files": output.outcomes,
    })
    .to_string();

    Ok(ConversionResultJs {
        pdf_bytes: output.pdf,
        file_name: default_download_name(),
        succeeded: output.summary.succeeded,
        failed: output.summary.failed,
        skipped: output.summary.skipped,
        summary_json,
    })
}

/// Placement of a `width`x`height` image on a page, as `[w, h, x, y]`
#[wasm_bindgen]
pub fn fit_image_to_page(
    width: f64,
    height: f64,
    page_width: Option<f64>,
    page_height: Option<f64>,
    margin: Option<f64>,
) -> Vec<f64> {
    let page = PageSize {
        width: page_width.unwrap_or(PageSize::A4.width),
        height: page_height.unwrap_or(PageSize::A4.height),
    };
    let p = fit_to_page(width, height, page, margin.unwrap_or(10.0));
    vec![p.width, p.height, p.x, p.y]
}

/// Suggested file name for a download link
#[wasm_bindgen]
pub fn download_name() -> String {
    default_download_name()
}

/// A compressed JPEG
#[wasm_bindgen]
pub struct CompressedImageJs {
    name: String,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    created_at: f64,
}

#[wasm_bindgen]
impl CompressedImageJs {
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.name.clone()
    }

    /// JPEG bytes
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn mime_type(&self) -> String {
        compress::COMPRESSED_MIME.to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter)]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Creation time in milliseconds since the epoch
    #[wasm_bindgen(getter)]
    pub fn created_at(&self) -> f64 {
        self.created_at
    }
}

/// Result of a conversion with statistics
#[wasm_bindgen]
pub struct ConversionResultJs {
    pdf_bytes: Vec<u8>,
    file_name: String,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    summary_json: String,
}

#[wasm_bindgen]
impl ConversionResultJs {
    /// Get the PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    /// Suggested download name
    #[wasm_bindgen(getter)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    #[wasm_bindgen(getter)]
    pub fn failed(&self) -> usize {
        self.failed
    }

    #[wasm_bindgen(getter)]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Per-file outcomes and totals as a JSON string
    #[wasm_bindgen(getter)]
    pub fn summary_json(&self) -> String {
        self.summary_json.clone()
    }
}
