//! Image to PDF CLI
//!
//! Command-line interface for converting images into a PDF, locally or
//! through a remote conversion endpoint.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use image2pdf::file_ops::{convert_files, load_source_image};
use image2pdf::transport::Uploader;
use image2pdf::{
    default_download_name, BatchSummary, CompressionOptions, ConversionJob, ConvertOptions,
    FileError, PageLayout, PageSize, ProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    /// Center each image on an A4 page
    A4,
    /// Size each page to its image
    Native,
}

/// Convert JPEG/PNG images into a PDF, one page per image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image files, in page order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF file path (default: converted_images_<timestamp>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum image width in pixels after compression
    #[arg(long, default_value = "1024")]
    max_width: u32,

    /// JPEG quality factor (0-1]
    #[arg(short, long, default_value = "0.8")]
    quality: f32,

    /// Embed the original files without recompressing them
    #[arg(long)]
    no_compress: bool,

    /// Page layout
    #[arg(long, value_enum, default_value = "a4")]
    layout: Layout,

    /// Margin around the printable area in millimetres (A4 layout)
    #[arg(long, default_value = "10")]
    margin: f64,

    /// Compress PDF streams (reduces file size)
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    compress_streams: bool,

    /// Send the images to this conversion endpoint instead of converting locally
    #[arg(long)]
    upload: Option<String>,

    /// Upload timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Upload retries after the first attempt
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Total upload attempts: the first one plus `--retries`.
    fn upload_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Prints one status line per file, like the page's file list.
struct ConsoleProgress;

fn megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

impl ProgressCallback for ConsoleProgress {
    fn on_file_complete(&self, _index: usize, name: &str, input_bytes: usize, output_bytes: usize) {
        println!(
            "  [ok]   {}  {} -> {}",
            name,
            megabytes(input_bytes),
            megabytes(output_bytes)
        );
    }

    fn on_file_skipped(&self, _index: usize, error: &FileError) {
        println!("  [skip] {}", error);
    }

    fn on_file_error(&self, _index: usize, error: &FileError) {
        println!("  [fail] {}", error);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        println!(
            "\n{} ready, {} failed, {} skipped. Total image size: {}",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            megabytes(summary.output_bytes)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "image2pdf=debug" } else { "image2pdf=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = ConvertOptions {
        compression: (!args.no_compress).then_some(CompressionOptions {
            max_width: args.max_width,
            quality: args.quality,
        }),
        layout: match args.layout {
            Layout::A4 => PageLayout::Fixed {
                page: PageSize::A4,
                margin: args.margin,
            },
            Layout::Native => PageLayout::Native,
        },
        compress_streams: args.compress_streams,
    };

    println!("Image to PDF");
    println!("============");

    let progress: Arc<dyn ProgressCallback> = Arc::new(ConsoleProgress);

    let output = match &args.upload {
        None => {
            let output = args.output.clone().unwrap_or_else(|| default_download_name().into());
            let result = convert_files(&args.inputs, &output, &options, progress)?;
            println!(
                "Done! {} page(s), {}",
                result.summary.succeeded,
                megabytes(result.pdf.len())
            );
            output
        }
        Some(endpoint) => {
            let mut job = ConversionJob::new(options).with_progress(progress);
            for path in &args.inputs {
                job.push(load_source_image(path)?);
            }
            let images = job.prepare()?.into_images()?;

            let uploaded = Uploader::new(endpoint.clone())
                .with_timeout(Duration::from_secs(args.timeout))
                .with_max_attempts(args.upload_attempts())
                .upload(&images)
                .await?;

            let output = args
                .output
                .clone()
                .or_else(|| {
                    // Keep only the final component of a server-suggested name.
                    uploaded
                        .filename
                        .as_deref()
                        .and_then(|n| Path::new(n).file_name())
                        .map(PathBuf::from)
                })
                .unwrap_or_else(|| default_download_name().into());
            std::fs::write(&output, &uploaded.pdf)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Done! Received {}", megabytes(uploaded.pdf.len()));
            output
        }
    };

    println!("Output saved to: {:?}", output);

    Ok(())
}
