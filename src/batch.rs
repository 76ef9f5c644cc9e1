//! Batch driver: runs every file through the stages, one at a time.
//!
//! Files are handled strictly in input order and each one finishes (success
//! or failure) before the next starts, so page order always matches the
//! selection order. Per-file failures are recorded and the batch continues.
//! Document assembly only happens when at least one file survived.

use crate::assemble::{PageImage, PdfAssembler};
use crate::compress::compress_image;
use crate::error::{ConvertError, FileError};
use crate::media::{ImageKind, SourceImage};
use crate::progress::{NoopProgress, ProgressCallback};
use crate::ConvertOptions;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one input file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Ready for (or placed on) a page
    Converted {
        width: u32,
        height: u32,
        output_bytes: usize,
    },
    /// Declared type outside the allow-list; not counted as a failure
    Skipped { error: FileError },
    Failed { error: FileError },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub index: usize,
    pub name: String,
    pub input_bytes: usize,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self.status, FileStatus::Converted { .. })
    }
}

/// Totals for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Sum of the input file sizes
    pub input_bytes: usize,
    /// Sum of the image payloads that will be embedded or uploaded
    pub output_bytes: usize,
    /// Size of the assembled document, 0 until assembly succeeded
    pub pdf_bytes: usize,
}

impl BatchSummary {
    fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            summary.input_bytes += outcome.input_bytes;
            match &outcome.status {
                FileStatus::Converted { output_bytes, .. } => {
                    summary.succeeded += 1;
                    summary.output_bytes += output_bytes;
                }
                FileStatus::Skipped { .. } => summary.skipped += 1,
                FileStatus::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Images that survived the per-file stages, plus the record of every file.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub images: Vec<PageImage>,
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

impl PreparedBatch {
    /// The surviving images, or `EmptyBatch` when none are left.
    pub fn into_images(self) -> Result<Vec<PageImage>, ConvertError> {
        if self.images.is_empty() {
            return Err(ConvertError::EmptyBatch {
                skipped: self.summary.skipped,
                failed: self.summary.failed,
            });
        }
        Ok(self.images)
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub pdf: Vec<u8>,
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

/// One user-initiated conversion: ordered files in, at most one PDF out.
pub struct ConversionJob {
    files: Vec<SourceImage>,
    options: ConvertOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl ConversionJob {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            files: Vec::new(),
            options,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn push(&mut self, file: SourceImage) {
        self.files.push(file);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Run the per-file stages over every file, in order.
    pub fn prepare(&self) -> Result<PreparedBatch, ConvertError> {
        self.options.validate()?;
        self.progress.on_batch_start(self.files.len());

        let mut images = Vec::new();
        let mut outcomes = Vec::with_capacity(self.files.len());

        for (index, file) in self.files.iter().enumerate() {
            let status = match self.prepare_file(index, file) {
                Ok(image) => {
                    self.progress
                        .on_file_complete(index, &file.name, file.bytes.len(), image.bytes.len());
                    let status = FileStatus::Converted {
                        width: image.width,
                        height: image.height,
                        output_bytes: image.bytes.len(),
                    };
                    images.push(image);
                    status
                }
                Err(error @ FileError::UnsupportedType { .. }) => {
                    debug!("{}", error);
                    self.progress.on_file_skipped(index, &error);
                    FileStatus::Skipped { error }
                }
                Err(error) => {
                    warn!("{}", error);
                    self.progress.on_file_error(index, &error);
                    FileStatus::Failed { error }
                }
            };
            outcomes.push(FileOutcome {
                index,
                name: file.name.clone(),
                input_bytes: file.bytes.len(),
                status,
            });
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            "Prepared {} file(s): {} ok, {} failed, {} skipped ({} -> {} bytes)",
            summary.total,
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.input_bytes,
            summary.output_bytes
        );
        self.progress.on_batch_complete(&summary);

        Ok(PreparedBatch {
            images,
            outcomes,
            summary,
        })
    }

    fn prepare_file(&self, index: usize, file: &SourceImage) -> Result<PageImage, FileError> {
        let kind = file.kind()?;
        self.progress.on_file_start(index, &file.name);

        match &self.options.compression {
            Some(compression) => {
                let compressed = compress_image(file, compression)?;
                Ok(PageImage {
                    name: compressed.name,
                    kind: ImageKind::Jpeg,
                    bytes: compressed.bytes,
                    width: compressed.width,
                    height: compressed.height,
                })
            }
            None => {
                let (width, height) = file.probe_dimensions()?;
                Ok(PageImage {
                    name: file.name.clone(),
                    kind,
                    bytes: file.bytes.clone(),
                    width,
                    height,
                })
            }
        }
    }

    /// Prepare every file and assemble the survivors into one PDF.
    pub fn run(&self) -> Result<ConversionOutput, ConvertError> {
        let prepared = self.prepare()?;
        let outcomes = prepared.outcomes.clone();
        let mut summary = prepared.summary.clone();
        let images = prepared.into_images()?;

        let mut assembler = PdfAssembler::new(self.options.layout);
        for image in &images {
            assembler.add_page(image)?;
        }
        let pdf = assembler.finish(self.options.compress_streams)?;
        summary.pdf_bytes = pdf.len();

        info!(
            "Assembled {} page(s) into {} bytes",
            images.len(),
            pdf.len()
        );

        Ok(ConversionOutput {
            pdf,
            outcomes,
            summary,
        })
    }
}
