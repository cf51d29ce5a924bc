//! Error types for the scan2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ValidationError`] — **Rejected input**: the submitted file is not the
//!   accepted document type, is empty or unreadable, or the user has not
//!   confirmed their rights to it. Raised before any backend call; the job
//!   never leaves `Idle`.
//!
//! * [`ConvertError`] — everything else: missing configuration, transport and
//!   HTTP failures from the job client, backend-reported failures, polling
//!   timeouts, and usage errors such as fetching a result that is not ready.
//!
//! Transport-level variants never reach callers of
//! [`crate::converter::Converter::submit`] directly: the tracker converts
//! them into a single `Error` transition whose message is the variant's
//! display text.

use crate::job::JobStatus;
use crate::state::JobEvent;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the scan2docx library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The backend base address is missing or unusable.
    #[error("Backend is not configured: {0}\nSet SCAN2DOCX_API_BASE_URL or configure `base_url`.")]
    Config(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The submission was rejected before any backend call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Job client errors ─────────────────────────────────────────────────
    /// The backend answered with a non-success status code.
    #[error("{operation} failed: HTTP {status}{}", fmt_body(.body))]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, connect, TLS, reset…).
    #[error("{operation} failed: {reason}\nCheck that the conversion backend is reachable.")]
    Network {
        operation: &'static str,
        reason: String,
    },

    /// The backend responded but the body could not be understood.
    #[error("{operation} returned an unexpected response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// The backend reported that the conversion failed.
    #[error("{message}")]
    RemoteFailed { message: String },

    /// The backend did not reach a terminal status within the wait budget.
    #[error("Conversion timed out after {waited_secs}s without a result from the backend")]
    Timeout { waited_secs: u64 },

    /// The event is not valid in the current state.
    #[error("Invalid transition: {event} while {from}")]
    InvalidTransition { from: JobStatus, event: JobEvent },

    /// A new submission arrived while the current job is not idle or ready.
    #[error("Cannot start a new conversion while the current job is {status}; retry first")]
    JobInProgress { status: JobStatus },

    /// This cycle was superseded by a retry or a newer submission.
    #[error("Conversion cycle was cancelled")]
    Cancelled,

    /// A result was requested before the job reached `Ready`.
    #[error("No converted document is available (job is {status})")]
    ResultNotReady { status: JobStatus },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Build a `Network` or `Decode` error from a reqwest failure.
    pub(crate) fn from_reqwest(operation: &'static str, e: reqwest::Error) -> Self {
        if e.is_decode() {
            ConvertError::Decode {
                operation,
                detail: e.to_string(),
            }
        } else {
            ConvertError::Network {
                operation,
                reason: e.to_string(),
            }
        }
    }

    /// Whether this error is raised before a job ever leaves `Idle`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ConvertError::Config(_)
                | ConvertError::Validation(_)
                | ConvertError::JobInProgress { .. }
        )
    }
}

fn fmt_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else if body.chars().count() > 200 {
        let head: String = body.chars().take(199).collect();
        format!(" {head}\u{2026}")
    } else {
        format!(" {body}")
    }
}

/// Reasons a submission is rejected before it reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The file is not a PDF.
    #[error("'{name}' is not a PDF (detected {media_type}); only PDF documents can be converted")]
    UnsupportedMediaType { name: String, media_type: String },

    /// The file has no content.
    #[error("'{name}' is empty")]
    EmptyFile { name: String },

    /// The user has not confirmed they may process the document.
    #[error("Confirm that you have rights to this document and agree to processing")]
    RightsNotConfirmed,

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },
}
