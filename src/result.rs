//! Result gate: the converted document is only reachable once the job is
//! `Ready`.
//!
//! Asking for a result earlier is a usage error ([`ConvertError::ResultNotReady`]),
//! reported without contacting the backend.

use crate::error::ConvertError;
use crate::job::{JobSnapshot, JobStatus};
use once_cell::sync::Lazy;
use regex::Regex;

/// Extension of the converted document.
pub const TARGET_EXTENSION: &str = "docx";

/// Media type of the converted document.
pub const TARGET_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Name used when the source had no usable name.
pub const FALLBACK_NAME: &str = "converted.docx";

static RE_SOURCE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").unwrap());

/// True iff the job has finished successfully.
pub fn can_download(job: &JobSnapshot) -> bool {
    job.status == JobStatus::Ready
}

/// The id of a `Ready` job, or `ResultNotReady`.
pub fn ready_job_id(job: &JobSnapshot) -> Result<&str, ConvertError> {
    match (&job.status, job.id.as_deref()) {
        (JobStatus::Ready, Some(id)) => Ok(id),
        (status, _) => Err(ConvertError::ResultNotReady { status: *status }),
    }
}

/// Derive the output filename from the source filename.
///
/// A trailing `.pdf` (any case) becomes `.docx`; any other name gets `.docx`
/// appended.
///
/// ```rust
/// use scan2docx::download_name;
///
/// assert_eq!(download_name("report.PDF"), "report.docx");
/// assert_eq!(download_name("noext"), "noext.docx");
/// ```
pub fn download_name(original: &str) -> String {
    let original = original.trim();
    if original.is_empty() || original.eq_ignore_ascii_case(".pdf") {
        return FALLBACK_NAME.to_string();
    }
    if RE_SOURCE_EXT.is_match(original) {
        RE_SOURCE_EXT
            .replace(original, format!(".{TARGET_EXTENSION}").as_str())
            .into_owned()
    } else {
        format!("{original}.{TARGET_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_pdf_extension_case_insensitively() {
        assert_eq!(download_name("report.PDF"), "report.docx");
        assert_eq!(download_name("invoice.pdf"), "invoice.docx");
        assert_eq!(download_name("Scan.Pdf"), "Scan.docx");
    }

    #[test]
    fn appends_when_no_pdf_extension() {
        assert_eq!(download_name("noext"), "noext.docx");
        assert_eq!(download_name("photo.png"), "photo.png.docx");
    }

    #[test]
    fn only_the_trailing_extension_is_replaced() {
        assert_eq!(download_name("a.pdf.backup.pdf"), "a.pdf.backup.docx");
        assert_eq!(download_name("pdf"), "pdf.docx");
    }

    #[test]
    fn empty_names_fall_back() {
        assert_eq!(download_name(""), FALLBACK_NAME);
        assert_eq!(download_name(".pdf"), FALLBACK_NAME);
    }

    #[test]
    fn gate_requires_ready() {
        let mut job = JobSnapshot {
            id: Some("j1".into()),
            status: JobStatus::Processing,
            ..JobSnapshot::default()
        };
        assert!(!can_download(&job));
        assert!(matches!(
            ready_job_id(&job),
            Err(ConvertError::ResultNotReady {
                status: JobStatus::Processing
            })
        ));

        job.status = JobStatus::Ready;
        assert!(can_download(&job));
        assert_eq!(ready_job_id(&job).unwrap(), "j1");
    }
}
