//! End-to-end conversion tests: files in, PDF out.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image2pdf::file_ops::{convert_files, load_source_image};
use image2pdf::{
    convert_images, CompressionOptions, ConvertError, ConvertOptions, FileStatus, NoopProgress,
    PageLayout, PageSize, SourceImage,
};
use lopdf::Document;
use std::io::Cursor;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 30, 30]))),
        ImageFormat::Jpeg,
    )
}

fn png(w: u32, h: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([30, 200, 30, 128]))),
        ImageFormat::Png,
    )
}

/// Width of the image drawn on each page, in page order.
fn page_image_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(pdf).expect("output must be a valid PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let res = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobj = res.get(b"XObject").unwrap().as_dict().unwrap();
            let img_id = xobj.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(img_id).unwrap().as_stream().unwrap();
            stream.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect()
}

fn uncompressed() -> ConvertOptions {
    ConvertOptions {
        compression: None,
        compress_streams: false,
        ..Default::default()
    }
}

// ── Batch behaviour ──────────────────────────────────────────────────────────

#[test]
fn gif_in_the_middle_yields_two_pages_in_order() {
    let files = vec![
        SourceImage::new("first.jpg", "image/jpeg", jpeg(64, 32)),
        SourceImage::new("second.gif", "image/gif", b"GIF89a\x01\x00\x01\x00".to_vec()),
        SourceImage::new("third.png", "image/png", png(48, 96)),
    ];

    let out = convert_images(files, &uncompressed()).unwrap();
    assert_eq!(page_image_widths(&out.pdf), vec![64, 48]);
    assert_eq!(out.summary.total, 3);
    assert_eq!(out.summary.succeeded, 2);
    assert_eq!(out.summary.skipped, 1);
    assert_eq!(out.outcomes[1].name, "second.gif");
}

#[test]
fn page_order_follows_input_order_after_compression() {
    let files = (1..=5)
        .map(|i| SourceImage::new(format!("{i}.png"), "image/png", png(i * 10, 20)))
        .collect();
    let out = convert_images(files, &ConvertOptions::default()).unwrap();
    assert_eq!(page_image_widths(&out.pdf), vec![10, 20, 30, 40, 50]);
}

#[test]
fn all_decode_failures_produce_no_document() {
    let files = vec![
        SourceImage::new("a.jpg", "image/jpeg", b"\xFF\xD8 broken".to_vec()),
        SourceImage::new("b.png", "image/png", b"\x89PNG broken".to_vec()),
    ];
    match convert_images(files, &ConvertOptions::default()) {
        Err(ConvertError::EmptyBatch { skipped, failed }) => assert_eq!((skipped, failed), (0, 2)),
        Err(other) => panic!("expected EmptyBatch, got {other}"),
        Ok(_) => panic!("a document was produced from undecodable input"),
    }
}

#[test]
fn compressed_pages_are_capped_at_max_width() {
    let options = ConvertOptions {
        compression: Some(CompressionOptions {
            max_width: 100,
            quality: 0.7,
        }),
        ..Default::default()
    };
    let files = vec![
        SourceImage::new("wide.jpg", "image/jpeg", jpeg(400, 300)),
        SourceImage::new("narrow.png", "image/png", png(60, 300)),
    ];
    let out = convert_images(files, &options).unwrap();
    assert_eq!(page_image_widths(&out.pdf), vec![100, 60]);

    match &out.outcomes[0].status {
        FileStatus::Converted { width, height, .. } => assert_eq!((*width, *height), (100, 75)),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn oversized_image_is_centered_on_a4() {
    let options = ConvertOptions {
        compression: None,
        layout: PageLayout::Fixed {
            page: PageSize::A4,
            margin: 10.0,
        },
        compress_streams: false,
    };
    let out = convert_images(
        vec![SourceImage::new("square.jpg", "image/jpeg", jpeg(400, 400))],
        &options,
    )
    .unwrap();

    let doc = Document::load_mem(&out.pdf).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    let text = String::from_utf8_lossy(&content);
    // 190 x 190 mm at (10, 53.5) mm on a 210 x 297 mm page
    assert!(
        text.contains("538.5827 0 0 538.5827 28.3465 151.6535 cm"),
        "got {text}"
    );
}

#[test]
fn summary_serializes_to_json() {
    let files = vec![
        SourceImage::new("a.jpg", "image/jpeg", jpeg(8, 8)),
        SourceImage::new("b.txt", "text/plain", b"hello".to_vec()),
    ];
    let out = convert_images(files, &ConvertOptions::default()).unwrap();
    let json = serde_json::to_value(&out.outcomes).unwrap();
    assert_eq!(json[0]["status"], "converted");
    assert_eq!(json[1]["status"], "skipped");
    assert_eq!(json[1]["error"]["kind"], "unsupported_type");
}

// ── File system ──────────────────────────────────────────────────────────────

#[test]
fn convert_files_writes_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.JPG");
    let b = dir.path().join("b.png");
    let c = dir.path().join("notes.txt");
    std::fs::write(&a, jpeg(50, 20)).unwrap();
    std::fs::write(&b, png(20, 50)).unwrap();
    std::fs::write(&c, b"not an image").unwrap();
    let output = dir.path().join("out.pdf");

    let result = convert_files(
        &[&a, &b, &c],
        &output,
        &ConvertOptions::default(),
        Arc::new(NoopProgress),
    )
    .unwrap();

    assert_eq!(result.summary.succeeded, 2);
    assert_eq!(result.summary.skipped, 1);
    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, result.pdf);
    assert_eq!(page_image_widths(&written), vec![50, 20]);
}

#[test]
fn missing_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_source_image(&dir.path().join("nope.jpg")).unwrap_err();
    assert!(matches!(err, ConvertError::Io { .. }));
}

#[test]
fn empty_batch_leaves_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("x.gif");
    std::fs::write(&gif, b"GIF89a").unwrap();
    let output = dir.path().join("out.pdf");

    let err = convert_files(
        &[&gif],
        &output,
        &ConvertOptions::default(),
        Arc::new(NoopProgress),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::EmptyBatch { skipped: 1, failed: 0 }));
    assert!(!output.exists());
}
