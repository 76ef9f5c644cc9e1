//! Compression stage: downsample to a maximum width and re-encode as JPEG.
//!
//! The source is never upscaled. Alpha is flattened onto a white background
//! because the output is always baseline JPEG.

use crate::error::FileError;
use crate::media::SourceImage;
use crate::{now_ms, CompressionOptions};
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// MIME type of every compressed image.
pub const COMPRESSED_MIME: &str = "image/jpeg";

/// JPEG bytes produced from one [`SourceImage`].
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// Name inherited from the source file
    pub name: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at_ms: u64,
}

impl CompressedImage {
    pub fn mime(&self) -> &'static str {
        COMPRESSED_MIME
    }
}

/// Output dimensions for a source of `width`×`height` capped at `max_width`.
///
/// Height is rounded to the nearest pixel and never drops below 1.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Convert a `(0, 1]` quality factor to the encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Decode, downsample and re-encode `source` as JPEG.
pub fn compress_image(
    source: &SourceImage,
    options: &CompressionOptions,
) -> Result<CompressedImage, FileError> {
    let img = image::load_from_memory(&source.bytes).map_err(|e| FileError::Decode {
        name: source.name.clone(),
        detail: e.to_string(),
    })?;

    let (src_w, src_h) = (img.width(), img.height());
    let (width, height) = target_dimensions(src_w, src_h, options.max_width);

    let resized = if (width, height) != (src_w, src_h) {
        resample_image(&img, width, height)
    } else {
        img
    };

    let rgb = flatten_to_rgb(&resized);
    let bytes = encode_jpeg(&rgb, jpeg_quality(options.quality)).map_err(|detail| {
        FileError::Encoding {
            name: source.name.clone(),
            detail,
        }
    })?;

    debug!(
        "Compressed '{}': {}x{} -> {}x{}, {} -> {} bytes",
        source.name,
        src_w,
        src_h,
        width,
        height,
        source.bytes.len(),
        bytes.len()
    );

    Ok(CompressedImage {
        name: source.name.clone(),
        bytes,
        width,
        height,
        created_at_ms: now_ms(),
    })
}

/// Resample an image to target dimensions
fn resample_image(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    img.resize_exact(
        target_width,
        target_height,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Composite onto white, dropping the alpha channel.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = src.0[3] as u32;
        for c in 0..3 {
            let v = src.0[c] as u32 * alpha + 255 * (255 - alpha);
            dst.0[c] = ((v + 127) / 255) as u8;
        }
    }
    out
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
    let (width, height) = rgb.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(format!("{}x{} exceeds the JPEG size limit", width, height));
    }

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder
        .encode(
            rgb.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .map_err(|e| e.to_string())?;

    if jpeg_bytes.is_empty() {
        return Err("encoder returned no data".to_string());
    }
    Ok(jpeg_bytes)
}
