//! # scan2docx
//!
//! Submit a scanned PDF to a remote OCR backend, follow the conversion job
//! until it finishes, and download the editable DOCX.
//!
//! The OCR itself happens on the backend. This crate owns the job lifecycle
//! around it: creating the remote job, streaming the upload, polling the
//! backend's multi-stage progress, turning every failure into one
//! displayable error, and only handing out the result once it exists.
//!
//! ## Lifecycle
//!
//! ```text
//! submit(file)
//!  │
//!  ├─ 0. Validate   PDF only, non-empty, rights confirmed (no network)
//!  ├─ 1. Create     POST /v1/jobs                     Idle → Uploading
//!  ├─ 2. Upload     POST /v1/jobs/{id}/file           progress 0‥100, then Uploading → Processing
//!  ├─ 3. Poll       GET  /v1/jobs/{id}  (backoff)     stage + progress
//!  └─ 4. Finish     Ready → download  |  Error → retry → Idle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2docx::{Converter, ConverterConfig, JobStatus, SourceFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads SCAN2DOCX_API_BASE_URL
//!     let converter = Converter::new(ConverterConfig::from_env()?)?;
//!     let file = SourceFile::from_path("invoice.pdf").await?;
//!
//!     let job = converter.submit(file, true).await?;
//!     match job.status {
//!         JobStatus::Ready => {
//!             let name = converter.download_name().unwrap_or_default();
//!             converter.download_to(&name).await?;
//!             println!("saved {name}");
//!         }
//!         _ => eprintln!("{}", job.error_message.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Privacy
//!
//! The backend deletes uploaded and generated files after
//! [`RETENTION_WINDOW`] (24 hours). Nothing is persisted locally beyond the
//! file the caller chooses to download.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod progress;
pub mod result;
pub mod source;
pub mod state;
mod tracker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{
    CreatedJob, HttpJobClient, JobApi, RemoteState, RemoteStatus, ResultStream,
    TransferProgress, UploadProgressFn, UploadReceipt,
};
pub use config::{
    ConversionOptions, ConverterConfig, ConverterConfigBuilder, DocumentLanguage, OutputQuality,
    RETENTION_WINDOW,
};
pub use converter::Converter;
pub use error::{ConvertError, ValidationError};
pub use job::{format_file_size, JobSnapshot, JobStatus};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use result::{can_download, download_name};
pub use source::{SourceFile, ACCEPTED_MEDIA_TYPE};
