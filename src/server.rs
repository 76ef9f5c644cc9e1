//! Conversion endpoint handler, independent of any HTTP framework.
//!
//! The hosting server parses the multipart body into [`UploadedPart`]s and
//! writes the returned [`ConvertResponse`] back to the client.

use crate::batch::ConversionJob;
use crate::error::ConvertError;
use crate::media::SourceImage;
use crate::{ConvertOptions, PageLayout};
use serde_json::json;
use tracing::{error, info};

/// Multipart field carrying the images.
pub const UPLOAD_FIELD: &str = "images";

/// Filename suggested to the client for the generated document.
pub const RESPONSE_FILENAME: &str = "converted.pdf";

/// One file part of the multipart request body.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConvertResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ConvertResponse {
    fn json_error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn pdf(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type".into(), "application/pdf".into()),
                (
                    "Content-Disposition".into(),
                    format!("attachment; filename=\"{}\"", RESPONSE_FILENAME),
                ),
            ],
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Options used by the endpoint: uploads are already compressed by the
/// client, and each page takes the size of its image.
pub fn server_options() -> ConvertOptions {
    ConvertOptions {
        compression: None,
        layout: PageLayout::Native,
        ..Default::default()
    }
}

/// Handle one request to the conversion endpoint.
pub fn handle_convert_request(
    method: &str,
    parts: Vec<UploadedPart>,
    options: &ConvertOptions,
) -> ConvertResponse {
    if !method.eq_ignore_ascii_case("POST") {
        return ConvertResponse {
            status: 405,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: b"Method Not Allowed".to_vec(),
        };
    }

    let mut job = ConversionJob::new(options.clone());
    for part in parts.into_iter().filter(|p| p.field == UPLOAD_FIELD) {
        job.push(SourceImage::new(part.file_name, part.content_type, part.bytes));
    }

    if job.is_empty() {
        return ConvertResponse::json_error(400, "No images uploaded");
    }

    match job.run() {
        Ok(output) => {
            info!(
                "Converted {} of {} upload(s) into {} bytes",
                output.summary.succeeded,
                output.summary.total,
                output.pdf.len()
            );
            ConvertResponse::pdf(output.pdf)
        }
        Err(ConvertError::EmptyBatch { .. }) => {
            ConvertResponse::json_error(400, "No supported images uploaded")
        }
        Err(e) => {
            error!("PDF conversion error: {}", e);
            ConvertResponse::json_error(500, "Error processing files")
        }
    }
}
