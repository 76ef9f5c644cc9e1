//! Progress callbacks for per-file batch events.
//!
//! The batch driver calls these in input order, from the thread running the
//! job. Every method has a no-op default so callers override only what they
//! display.

use crate::batch::BatchSummary;
use crate::error::FileError;

/// Receives events while a [`crate::batch::ConversionJob`] runs.
///
/// `index` is the 0-based position of the file in the job.
pub trait ProgressCallback: Send + Sync {
    /// Called once before the first file is looked at.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a supported file enters the compression stage.
    fn on_file_start(&self, index: usize, name: &str) {
        let _ = (index, name);
    }

    /// Called when a file is ready to be placed on a page.
    fn on_file_complete(&self, index: usize, name: &str, input_bytes: usize, output_bytes: usize) {
        let _ = (index, name, input_bytes, output_bytes);
    }

    /// Called for files outside the allow-list.
    fn on_file_skipped(&self, index: usize, error: &FileError) {
        let _ = (index, error);
    }

    /// Called when decoding or encoding a file failed.
    fn on_file_error(&self, index: usize, error: &FileError) {
        let _ = (index, error);
    }

    /// Called after the last file, before document assembly.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// Ignores every event.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}
