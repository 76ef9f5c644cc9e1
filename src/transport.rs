//! Upload client for a remote conversion endpoint.
//!
//! Prepared images are posted as one multipart request, field `images`.
//! Connection failures, timeouts, 429 and 5xx answers are retried with
//! exponential backoff (`backoff * 2^(retry-1)`, capped), re-sending the same
//! bytes each time. Any other non-success status fails immediately.

use crate::assemble::PageImage;
use crate::error::ConvertError;
use crate::server::UPLOAD_FIELD;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Upper bound for a single retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Document returned by the endpoint.
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub pdf: Vec<u8>,
    /// Filename suggested through `Content-Disposition`, if any
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Uploader {
    endpoint: String,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

enum Attempt {
    Done(UploadedPdf),
    Retry { status: Option<u16>, message: String },
    Fatal { status: Option<u16>, message: String },
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts including the first one. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait before `attempt` (2 or later), doubling each time up to [`MAX_BACKOFF`].
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(2));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Post `images` and return the PDF produced by the endpoint.
    pub async fn upload(&self, images: &[PageImage]) -> Result<UploadedPdf, ConvertError> {
        if images.is_empty() {
            return Err(ConvertError::EmptyBatch {
                skipped: 0,
                failed: 0,
            });
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConvertError::UploadTransport {
                status: None,
                message: e.to_string(),
                attempts: 0,
            })?;

        let total_bytes: usize = images.iter().map(|i| i.bytes.len()).sum();
        info!(
            "Uploading {} image(s), {} bytes, to {}",
            images.len(),
            total_bytes,
            self.endpoint
        );

        let mut last_status = None;
        let mut last_message = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.retry_delay(attempt);
                warn!(
                    "Upload retry {}/{} after {}ms",
                    attempt - 1,
                    self.max_attempts - 1,
                    delay.as_millis()
                );
                sleep(delay).await;
            }

            match self.attempt(&client, images).await {
                Attempt::Done(uploaded) => {
                    info!("Received {} byte PDF", uploaded.pdf.len());
                    return Ok(uploaded);
                }
                Attempt::Retry { status, message } => {
                    warn!("Upload attempt {} failed: {}", attempt, message);
                    last_status = status;
                    last_message = message;
                }
                Attempt::Fatal { status, message } => {
                    return Err(ConvertError::UploadTransport {
                        status,
                        message,
                        attempts: attempt,
                    });
                }
            }
        }

        Err(ConvertError::UploadTransport {
            status: last_status,
            message: last_message,
            attempts: self.max_attempts,
        })
    }

    async fn attempt(&self, client: &reqwest::Client, images: &[PageImage]) -> Attempt {
        let form = match build_form(images) {
            Ok(form) => form,
            Err(e) => {
                return Attempt::Fatal {
                    status: None,
                    message: e.to_string(),
                }
            }
        };

        let response = match client.post(&self.endpoint).multipart(form).send().await {
            Ok(r) => r,
            Err(e) if e.is_builder() => {
                return Attempt::Fatal {
                    status: None,
                    message: e.to_string(),
                }
            }
            Err(e) => {
                return Attempt::Retry {
                    status: None,
                    message: e.to_string(),
                }
            }
        };

        let status = response.status();
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("{} - {}", status.as_u16(), text.trim());
            return if is_retryable(status) {
                Attempt::Retry {
                    status: Some(status.as_u16()),
                    message,
                }
            } else {
                Attempt::Fatal {
                    status: Some(status.as_u16()),
                    message,
                }
            };
        }

        match response.bytes().await {
            Ok(body) if body.starts_with(b"%PDF") => Attempt::Done(UploadedPdf {
                pdf: body.to_vec(),
                filename,
            }),
            Ok(body) => Attempt::Fatal {
                status: Some(status.as_u16()),
                message: format!("response is not a PDF ({} bytes)", body.len()),
            },
            Err(e) => Attempt::Retry {
                status: Some(status.as_u16()),
                message: e.to_string(),
            },
        }
    }
}

fn build_form(images: &[PageImage]) -> Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for image in images {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.name.clone())
            .mime_str(image.kind.mime())?;
        form = form.part(UPLOAD_FIELD, part);
    }
    debug!("Built multipart body with {} part(s)", images.len());
    Ok(form)
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Extract `filename` from a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = val.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}
