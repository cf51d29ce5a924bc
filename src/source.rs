//! Source documents: load a user-supplied file and check it may be submitted.
//!
//! The media type is sniffed from the `%PDF` magic bytes rather than trusted
//! from the file extension, so a renamed PNG is rejected here instead of
//! failing later inside the backend's OCR pipeline.

use crate::error::ValidationError;
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, warn};

/// The only media type the conversion backend accepts.
pub const ACCEPTED_MEDIA_TYPE: &str = "application/pdf";

/// Media type reported for anything that is not recognisably a PDF.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// A document ready to be handed to the job client.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    media_type: String,
    data: Bytes,
}

impl SourceFile {
    /// Wrap in-memory content under a display name and declared media type.
    pub fn from_bytes(
        name: impl Into<String>,
        data: impl Into<Bytes>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Read a local file, deriving its media type from its content.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => ValidationError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ValidationError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let media_type = sniff_media_type(&data);
        debug!("Loaded {} ({} bytes, {})", path.display(), data.len(), media_type);

        Ok(Self {
            name,
            media_type: media_type.to_string(),
            data: Bytes::from(data),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// `application/pdf` when the content starts with `%PDF`.
pub fn sniff_media_type(data: &[u8]) -> &'static str {
    if data.starts_with(b"%PDF") {
        ACCEPTED_MEDIA_TYPE
    } else {
        UNKNOWN_MEDIA_TYPE
    }
}

/// Check a submission before any backend call is made.
///
/// `max_size_bytes` is advisory: oversized files are logged, not rejected,
/// because the backend owns enforcement.
pub fn validate_submission(
    file: &SourceFile,
    rights_confirmed: bool,
    max_size_bytes: u64,
) -> Result<(), ValidationError> {
    if !file.media_type().eq_ignore_ascii_case(ACCEPTED_MEDIA_TYPE) {
        return Err(ValidationError::UnsupportedMediaType {
            name: file.name().to_string(),
            media_type: file.media_type().to_string(),
        });
    }
    if file.size() == 0 {
        return Err(ValidationError::EmptyFile {
            name: file.name().to_string(),
        });
    }
    if !rights_confirmed {
        return Err(ValidationError::RightsNotConfirmed);
    }
    if file.size() > max_size_bytes {
        warn!(
            "{} is {} bytes, above the advertised limit of {} bytes; the backend may reject it",
            file.name(),
            file.size(),
            max_size_bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pdf(name: &str) -> SourceFile {
        SourceFile::from_bytes(name, b"%PDF-1.7\n...".to_vec(), ACCEPTED_MEDIA_TYPE)
    }

    #[test]
    fn sniffs_pdf_magic() {
        assert_eq!(sniff_media_type(b"%PDF-1.4"), ACCEPTED_MEDIA_TYPE);
        assert_eq!(sniff_media_type(b"\x89PNG"), UNKNOWN_MEDIA_TYPE);
        assert_eq!(sniff_media_type(b""), UNKNOWN_MEDIA_TYPE);
    }

    #[test]
    fn accepts_pdf_with_consent() {
        assert_eq!(validate_submission(&pdf("a.pdf"), true, 1024), Ok(()));
    }

    #[test]
    fn oversized_files_are_only_advisory() {
        assert_eq!(validate_submission(&pdf("a.pdf"), true, 1), Ok(()));
    }

    #[test]
    fn rejects_non_pdf() {
        let png = SourceFile::from_bytes("scan.png", vec![0x89, b'P', b'N', b'G'], "image/png");
        assert!(matches!(
            validate_submission(&png, true, 1024),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn rejects_without_consent() {
        assert_eq!(
            validate_submission(&pdf("a.pdf"), false, 1024),
            Err(ValidationError::RightsNotConfirmed)
        );
    }

    #[test]
    fn rejects_empty_file() {
        let empty = SourceFile::from_bytes("a.pdf", Vec::new(), ACCEPTED_MEDIA_TYPE);
        assert!(matches!(
            validate_submission(&empty, true, 1024),
            Err(ValidationError::EmptyFile { .. })
        ));
    }

    #[test]
    fn from_path_reads_and_sniffs() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.5 body").unwrap();

        let file = tokio_test::block_on(SourceFile::from_path(tmp.path())).unwrap();
        assert_eq!(file.media_type(), ACCEPTED_MEDIA_TYPE);
        assert_eq!(file.size(), 13);
        assert!(file.name().ends_with(".pdf"));
    }

    #[test]
    fn from_path_missing_file() {
        let err = tokio_test::block_on(SourceFile::from_path("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::FileNotFound { .. }));
    }
}
