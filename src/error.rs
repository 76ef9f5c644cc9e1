//! Error types for image-to-PDF conversion.
//!
//! * [`FileError`] is recorded against a single input file. The batch keeps
//!   going and the error ends up in that file's [`crate::batch::FileOutcome`].
//! * [`ConvertError`] aborts the whole conversion attempt and is returned to
//!   the caller.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one input file. Never aborts the batch.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileError {
    /// The bytes could not be interpreted as a JPEG or PNG image.
    #[error("Could not decode '{name}': {detail}")]
    Decode { name: String, detail: String },

    /// Re-encoding as JPEG produced no output.
    #[error("Could not encode '{name}' as JPEG: {detail}")]
    Encoding { name: String, detail: String },

    /// Declared MIME type is outside the JPEG/PNG allow-list.
    #[error("Skipping '{name}': unsupported type '{mime_type}'")]
    UnsupportedType { name: String, mime_type: String },
}

impl FileError {
    /// Name of the file the error is attached to.
    pub fn file_name(&self) -> &str {
        match self {
            FileError::Decode { name, .. }
            | FileError::Encoding { name, .. }
            | FileError::UnsupportedType { name, .. } => name,
        }
    }
}

/// Batch-level failure. Nothing is produced when one of these is returned.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// No eligible image survived filtering and compression.
    #[error("Nothing to convert: {skipped} file(s) skipped, {failed} file(s) failed")]
    EmptyBatch { skipped: usize, failed: usize },

    /// The conversion endpoint could not be reached or answered with an error.
    #[error("Upload failed after {attempts} attempt(s){}: {message}", status_suffix(.status))]
    UploadTransport {
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    /// The PDF encoder rejected an image or could not serialize the document.
    #[error("Failed to assemble PDF: {0}")]
    Assembly(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}
