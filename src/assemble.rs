//! Document assembly: one PDF page per image, built with lopdf.

use crate::error::ConvertError;
use crate::layout::{fit_to_page, mm_to_pt, native_placement, Placement};
use crate::media::ImageKind;
use crate::PageLayout;
use image::{ImageDecoder, ImageFormat, ImageReader};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use tracing::debug;

/// An image ready to be placed on a page.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub name: String,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Builds a PDF one page at a time, in call order.
pub struct PdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<Object>,
    layout: PageLayout,
}

impl PdfAssembler {
    pub fn new(layout: PageLayout) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            layout,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append a page showing `image`.
    pub fn add_page(&mut self, image: &PageImage) -> Result<(), ConvertError> {
        let image_id = match image.kind {
            ImageKind::Jpeg => {
                let stream = jpeg_stream(image)?;
                self.doc.add_object(stream)
            }
            ImageKind::Png => {
                let (mut stream, smask) = png_streams(image)?;
                if let Some(smask) = smask {
                    let smask_id = self.doc.add_object(smask);
                    stream.dict.set("SMask", Object::Reference(smask_id));
                }
                self.doc.add_object(stream)
            }
        };

        // Page box and image rectangle in points, y measured from the top.
        let (page_w, page_h, rect) = match self.layout {
            PageLayout::Fixed { page, margin } => {
                let p = fit_to_page(image.width as f64, image.height as f64, page, margin);
                let rect = Placement {
                    width: mm_to_pt(p.width),
                    height: mm_to_pt(p.height),
                    x: mm_to_pt(p.x),
                    y: mm_to_pt(p.y),
                };
                (mm_to_pt(page.width), mm_to_pt(page.height), rect)
            }
            PageLayout::Native => {
                let (w, h) = (image.width as f64, image.height as f64);
                (w, h, native_placement(w, h))
            }
        };

        // PDF user space has its origin at the bottom-left.
        let bottom = page_h - rect.y - rect.height;
        let content = format!(
            "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/Im0 Do\nQ\n",
            rect.width, rect.height, rect.x, bottom
        );
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => vec![0.into(), 0.into(), (page_w as f32).into(), (page_h as f32).into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
        };
        let page_id = self.doc.add_object(page);
        self.page_ids.push(Object::Reference(page_id));

        debug!(
            "Page {}: '{}' {}x{} px at {:.1},{:.1} size {:.1}x{:.1} pt",
            self.page_ids.len(),
            image.name,
            image.width,
            image.height,
            rect.x,
            bottom,
            rect.width,
            rect.height
        );
        Ok(())
    }

    /// Serialize the document. A document without pages is never produced.
    pub fn finish(mut self, compress_streams: bool) -> Result<Vec<u8>, ConvertError> {
        if self.page_ids.is_empty() {
            return Err(ConvertError::EmptyBatch {
                skipped: 0,
                failed: 0,
            });
        }

        let count = self.page_ids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal("converted_images"),
            "Producer" => Object::string_literal(concat!("image2pdf ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Info", Object::Reference(info_id));

        if compress_streams {
            self.doc.compress();
        }

        let mut output_bytes = Vec::new();
        self.doc
            .save_to(&mut output_bytes)
            .map_err(|e| ConvertError::Assembly(e.to_string()))?;
        Ok(output_bytes)
    }
}

fn assembly_err(image: &PageImage, detail: impl std::fmt::Display) -> ConvertError {
    ConvertError::Assembly(format!("'{}': {}", image.name, detail))
}

/// Embed JPEG bytes unchanged (DCTDecode).
fn jpeg_stream(image: &PageImage) -> Result<Stream, ConvertError> {
    let decoder = ImageReader::with_format(Cursor::new(&image.bytes), ImageFormat::Jpeg)
        .into_decoder()
        .map_err(|e| assembly_err(image, e))?;
    let (width, height) = decoder.dimensions();
    let info = jpeg_frame_info(&image.bytes)
        .ok_or_else(|| assembly_err(image, "no JPEG frame header"))?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(assembly_err(
                image,
                format!("unsupported JPEG with {} components", n),
            ))
        }
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8_i64,
        "Filter" => "DCTDecode",
    };
    // Adobe CMYK JPEGs store inverted ink values.
    if info.components == 4 && info.adobe {
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(Object::Integer)
            .collect();
        dict.set("Decode", decode);
    }
    Ok(Stream::new(dict, image.bytes.clone()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct JpegFrameInfo {
    components: u8,
    adobe: bool,
}

/// Walk the JPEG marker segments up to the frame header.
fn jpeg_frame_info(bytes: &[u8]) -> Option<JpegFrameInfo> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut adobe = false;
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        while *bytes.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos)?;
        pos += 1;
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        let segment = bytes.get(pos + 2..pos + len)?;
        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            // SOF0..SOF15 except DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(JpegFrameInfo {
                    components: *segment.get(5)?,
                    adobe,
                });
            }
            0xDA | 0xD9 => return None,
            _ => {}
        }
        pos += len;
    }
}

/// Decode a PNG and embed it losslessly, with a soft mask when it has alpha.
fn png_streams(image: &PageImage) -> Result<(Stream, Option<Stream>), ConvertError> {
    let img = image::load_from_memory_with_format(&image.bytes, ImageFormat::Png)
        .map_err(|e| assembly_err(image, e))?;
    let (width, height) = (img.width(), img.height());

    let rgb = img.to_rgb8().into_raw();
    let main = flate_image_stream(&rgb, width, height, "DeviceRGB")
        .map_err(|e| assembly_err(image, e))?;

    if !img.color().has_alpha() {
        return Ok((main, None));
    }
    let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
    if alpha.iter().all(|&a| a == 255) {
        return Ok((main, None));
    }

    let smask = flate_image_stream(&alpha, width, height, "DeviceGray")
        .map_err(|e| assembly_err(image, e))?;
    Ok((main, Some(smask)))
}

fn flate_image_stream(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &str,
) -> Result<Stream, std::io::Error> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8_i64,
        "Filter" => "FlateDecode",
    };
    Ok(Stream::new(dict, compressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PageSize;
    use image::{DynamicImage, Rgba, RgbaImage, RgbImage};

    fn encoded(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn jpeg_page(name: &str, w: u32, h: u32) -> PageImage {
        let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
        PageImage {
            name: name.into(),
            kind: ImageKind::Jpeg,
            bytes: encoded(img, ImageFormat::Jpeg),
            width: w,
            height: h,
        }
    }

    fn a4() -> PageLayout {
        PageLayout::Fixed {
            page: PageSize::A4,
            margin: 10.0,
        }
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn empty_document_is_refused() {
        let asm = PdfAssembler::new(a4());
        assert!(matches!(
            asm.finish(true),
            Err(ConvertError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn one_page_per_image_in_order() {
        let mut asm = PdfAssembler::new(a4());
        asm.add_page(&jpeg_page("a.jpg", 40, 20)).unwrap();
        asm.add_page(&jpeg_page("b.jpg", 20, 40)).unwrap();
        asm.add_page(&jpeg_page("c.jpg", 30, 30)).unwrap();
        assert_eq!(asm.page_count(), 3);

        let bytes = asm.finish(false).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        let widths: Vec<i64> = pages
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let res = page.get(b"Resources").unwrap().as_dict().unwrap();
                let xobj = res.get(b"XObject").unwrap().as_dict().unwrap();
                let img_id = xobj.get(b"Im0").unwrap().as_reference().unwrap();
                let stream = doc.get_object(img_id).unwrap().as_stream().unwrap();
                stream.dict.get(b"Width").unwrap().as_i64().unwrap()
            })
            .collect();
        assert_eq!(widths, vec![40, 20, 30]);
    }

    #[test]
    fn fixed_layout_uses_a4_media_box() {
        let mut asm = PdfAssembler::new(a4());
        asm.add_page(&jpeg_page("a.jpg", 64, 48)).unwrap();
        let doc = Document::load_mem(&asm.finish(true).unwrap()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let mb = media_box(&doc, page_id);
        assert!((mb[2] - 595.2756).abs() < 0.01, "got {:?}", mb);
        assert!((mb[3] - 841.8898).abs() < 0.01, "got {:?}", mb);
    }

    #[test]
    fn native_layout_uses_pixel_size() {
        let mut asm = PdfAssembler::new(PageLayout::Native);
        asm.add_page(&jpeg_page("a.jpg", 120, 80)).unwrap();
        let doc = Document::load_mem(&asm.finish(false).unwrap()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        assert_eq!(media_box(&doc, page_id), vec![0.0, 0.0, 120.0, 80.0]);

        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("120.0000 0 0 80.0000 0.0000 0.0000 cm"), "got {text}");
    }

    #[test]
    fn transparent_png_gets_soft_mask() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let page = PageImage {
            name: "alpha.png".into(),
            kind: ImageKind::Png,
            bytes: encoded(DynamicImage::ImageRgba8(img), ImageFormat::Png),
            width: 8,
            height: 8,
        };

        let mut asm = PdfAssembler::new(PageLayout::Native);
        asm.add_page(&page).unwrap();
        let doc = Document::load_mem(&asm.finish(false).unwrap()).unwrap();
        let has_smask = doc.objects.values().any(|o| {
            o.as_stream()
                .map(|s| s.dict.get(b"SMask").is_ok())
                .unwrap_or(false)
        });
        assert!(has_smask);
    }

    #[test]
    fn sparse_transparency_gets_soft_mask() {
        let mut img = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let page = PageImage {
            name: "sparse.png".into(),
            kind: ImageKind::Png,
            bytes: encoded(DynamicImage::ImageRgba8(img), ImageFormat::Png),
            width: 200,
            height: 200,
        };

        let (_, smask) = png_streams(&page).unwrap();
        assert!(smask.is_some(), "single transparent pixel lost");
    }

    #[test]
    fn opaque_rgba_png_has_no_soft_mask() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([9, 9, 9, 255]));
        let page = PageImage {
            name: "opaque.png".into(),
            kind: ImageKind::Png,
            bytes: encoded(DynamicImage::ImageRgba8(img), ImageFormat::Png),
            width: 16,
            height: 16,
        };
        let (_, smask) = png_streams(&page).unwrap();
        assert!(smask.is_none());
    }

    fn image_color_space(page: &PageImage) -> Vec<u8> {
        let mut asm = PdfAssembler::new(PageLayout::Native);
        asm.add_page(page).unwrap();
        let doc = Document::load_mem(&asm.finish(false).unwrap()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let res = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobj = res.get(b"XObject").unwrap().as_dict().unwrap();
        let img_id = xobj.get(b"Im0").unwrap().as_reference().unwrap();
        let stream = doc.get_object(img_id).unwrap().as_stream().unwrap();
        stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn cmyk_jpeg_is_embedded_as_device_cmyk() {
        let mut bytes = Vec::new();
        jpeg_encoder::Encoder::new(&mut bytes, 90)
            .encode(&[20u8; 8 * 8 * 4], 8, 8, jpeg_encoder::ColorType::Cmyk)
            .unwrap();
        let page = PageImage {
            name: "print.jpg".into(),
            kind: ImageKind::Jpeg,
            bytes,
            width: 8,
            height: 8,
        };
        assert_eq!(image_color_space(&page), b"DeviceCMYK");
    }

    #[test]
    fn grayscale_jpeg_is_embedded_as_device_gray() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(8, 8));
        let page = PageImage {
            name: "gray.jpg".into(),
            kind: ImageKind::Jpeg,
            bytes: encoded(img, ImageFormat::Jpeg),
            width: 8,
            height: 8,
        };
        assert_eq!(image_color_space(&page), b"DeviceGray");
        assert_eq!(image_color_space(&jpeg_page("rgb.jpg", 8, 8)), b"DeviceRGB");
    }

    #[test]
    fn frame_info_needs_a_jpeg() {
        assert_eq!(jpeg_frame_info(b"\x89PNG\r\n"), None);
        assert_eq!(jpeg_frame_info(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn invalid_jpeg_is_assembly_error() {
        let page = PageImage {
            name: "bad.jpg".into(),
            kind: ImageKind::Jpeg,
            bytes: b"definitely not a jpeg".to_vec(),
            width: 10,
            height: 10,
        };
        let mut asm = PdfAssembler::new(a4());
        match asm.add_page(&page) {
            Err(ConvertError::Assembly(msg)) => assert!(msg.contains("bad.jpg")),
            other => panic!("expected assembly error, got {:?}", other.err()),
        }
    }
}
