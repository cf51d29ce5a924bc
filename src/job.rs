//! The job data model: lifecycle status and the read-only snapshot handed to
//! callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of the active job.
///
/// `Ready` and `Error` are terminal: nothing moves the job on from there
/// except an explicit user command (`retry`, or a new `submit` from `Ready`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No job; waiting for a submission. (initial)
    #[default]
    Idle,
    /// The source file is being transferred to the backend.
    Uploading,
    /// The backend is converting; progress and stage come from polling.
    Processing,
    /// Conversion succeeded and the result may be downloaded.
    Ready,
    /// Conversion failed; `error_message` explains why.
    Error,
}

impl JobStatus {
    /// `Ready` or `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Error)
    }

    /// `Uploading` or `Processing`: a cycle is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Uploading | JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A point-in-time copy of the active job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Backend-assigned identifier; `None` until the job has been created.
    pub id: Option<String>,
    pub status: JobStatus,
    /// 0–100. Only meaningful while uploading or processing.
    pub progress: u8,
    /// Backend-reported processing step. Only present while processing.
    pub stage: Option<String>,
    pub file_name: Option<String>,
    /// Source file size in bytes.
    pub file_size: Option<u64>,
    /// Only present in the `Error` state, never empty.
    pub error_message: Option<String>,
}

impl JobSnapshot {
    /// Human-readable size of the source file, e.g. `"2.00 MB"`.
    pub fn file_size_display(&self) -> Option<String> {
        self.file_size.map(format_file_size)
    }
}

/// Format a byte count the way the upload card shows it: two decimals, MB
/// above one mebibyte and KB otherwise.
pub fn format_file_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes > MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_active_statuses() {
        assert!(JobStatus::Ready.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Uploading.is_active());
        assert!(!JobStatus::Idle.is_active());
    }

    #[test]
    fn file_size_formatting() {
        assert_eq!(format_file_size(2 * 1024 * 1024 + 1), "2.00 MB");
        assert_eq!(format_file_size(1024 * 1024), "1024.00 KB");
        assert_eq!(format_file_size(512), "0.50 KB");
    }

    #[test]
    fn status_serialises_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
