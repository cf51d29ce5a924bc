//! Progress-callback trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events as the tracker moves the job through its lifecycle.
//!
//! Callbacks fire only for transitions that were actually applied. Events
//! from a superseded cycle are discarded before they reach the callback, so a
//! progress bar never jumps backwards after a retry.
//!
//! # Example
//!
//! ```rust
//! use scan2docx::{ConverterConfig, JobProgressCallback, JobStatus};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StatusLog(Mutex<Vec<JobStatus>>);
//!
//! impl JobProgressCallback for StatusLog {
//!     fn on_status_change(&self, _from: JobStatus, to: JobStatus) {
//!         self.0.lock().unwrap().push(to);
//!     }
//! }
//!
//! let log = Arc::new(StatusLog::default());
//! let config = ConverterConfig::builder()
//!     .progress_callback(log as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::job::JobStatus;
use std::sync::Arc;

/// Called by the orchestrator after each applied state transition.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Methods are invoked outside the state lock and may
/// read the converter's snapshot.
pub trait JobProgressCallback: Send + Sync {
    /// Called whenever the lifecycle status changes.
    fn on_status_change(&self, from: JobStatus, to: JobStatus) {
        let _ = (from, to);
    }

    /// Called once the backend has assigned a job id.
    fn on_job_created(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called as the upload advances.
    ///
    /// # Arguments
    /// * `percent` — 0–100, never decreasing within one upload
    fn on_upload_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called for each processing update, including the initial stage shown
    /// right after the upload completes.
    ///
    /// # Arguments
    /// * `stage`   — backend-reported step, e.g. "Running OCR on pages..."
    /// * `percent` — 0–100, never decreasing within one processing phase
    fn on_processing(&self, stage: &str, percent: u8) {
        let _ = (stage, percent);
    }

    /// Called when the converted document becomes available.
    fn on_ready(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called when the job enters `Error`.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCallback {
        changes: AtomicUsize,
        uploads: AtomicUsize,
        errors: AtomicUsize,
    }

    impl JobProgressCallback for CountingCallback {
        fn on_status_change(&self, _from: JobStatus, _to: JobStatus) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_progress(&self, _percent: u8) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_status_change(JobStatus::Idle, JobStatus::Uploading);
        cb.on_job_created("job-1");
        cb.on_upload_progress(50);
        cb.on_processing("Running OCR", 30);
        cb.on_ready("job-1");
        cb.on_error("boom");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb = CountingCallback::default();
        cb.on_status_change(JobStatus::Idle, JobStatus::Uploading);
        cb.on_upload_progress(10);
        cb.on_upload_progress(20);
        cb.on_processing("ignored by default", 5);
        cb.on_error("HTTP 500");

        assert_eq!(cb.changes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_upload_progress(100);
    }
}
