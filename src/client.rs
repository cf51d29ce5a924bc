//! Job client: typed binding to the remote conversion API.
//!
//! The client holds no lifecycle state. Each method is one request/response
//! against the backend contract:
//!
//! ```text
//! POST {base}/v1/jobs                  → {job_id, status_url, upload_url, result_url}
//! POST {base}/v1/jobs/{id}/file        multipart, field "file"
//! GET  {base}/v1/jobs/{id}             → {status, progress?, stage?, error?}
//! GET  {base}/v1/jobs/{id}/result      → DOCX bytes
//! GET  {base}/v1/smoke_test_backend    → liveness payload
//! ```
//!
//! The orchestrator talks to the backend through the [`JobApi`] trait so the
//! lifecycle logic can be exercised without a network.

use crate::config::{ConversionOptions, ConverterConfig};
use crate::error::ConvertError;
use crate::source::{SourceFile, ACCEPTED_MEDIA_TYPE};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, Url};
use serde::{Deserialize, Deserializer, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Size of each multipart body chunk handed to the transport.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of result bytes.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<Bytes, ConvertError>> + Send>>;

/// Receives `(bytes handed to the transport, total bytes)` during an upload.
pub type UploadProgressFn = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Bytes of the source file handed to the transport so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Whole-percent completion, rounded down.
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Response of `POST /v1/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedJob {
    pub job_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
}

/// Acknowledgement of `POST /v1/jobs/{id}/file`.
///
/// The backend's payload is kept as-is; an empty body is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadReceipt(pub serde_json::Value);

/// Response of `GET /v1/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteStatus {
    pub status: RemoteState,
    #[serde(default, deserialize_with = "de_progress")]
    pub progress: Option<u8>,
    #[serde(default, alias = "step")]
    pub stage: Option<String>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

/// Backend status, folded into the three outcomes the tracker acts on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RemoteState {
    /// Still queued or running. Unknown values land here too.
    InProgress(String),
    Succeeded,
    Failed,
}

impl From<String> for RemoteState {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ready" | "done" | "completed" | "complete" | "succeeded" | "success" => {
                RemoteState::Succeeded
            }
            "error" | "failed" | "failure" => RemoteState::Failed,
            _ => RemoteState::InProgress(s),
        }
    }
}

fn de_progress<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let v: Option<f64> = Option::deserialize(d)?;
    Ok(v
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8))
}

// ── Trait ────────────────────────────────────────────────────────────────

/// The operations the orchestrator needs from a conversion backend.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Ask the backend for a new job.
    async fn create_job(&self) -> Result<CreatedJob, ConvertError>;

    /// Transfer the source file as one multipart body. Must be called once
    /// per job, after `create_job` and before any `get_status`.
    async fn upload_file(
        &self,
        job_id: &str,
        file: &SourceFile,
        options: &ConversionOptions,
        progress: UploadProgressFn,
    ) -> Result<UploadReceipt, ConvertError>;

    async fn get_status(&self, job_id: &str) -> Result<RemoteStatus, ConvertError>;

    /// Stream the converted document. Only meaningful after success.
    async fn fetch_result(&self, job_id: &str) -> Result<ResultStream, ConvertError>;

    /// Where the converted document can be downloaded from.
    fn result_url(&self, job_id: &str) -> String;

    /// Probe backend reachability, independent of any job.
    async fn health_check(&self) -> Result<serde_json::Value, ConvertError>;
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`JobApi`] over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    http: reqwest::Client,
    base: String,
    upload_timeout: Duration,
}

/// Trim trailing slashes and check the address is an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String, ConvertError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConvertError::Config("no backend base address is set".into()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| ConvertError::Config(format!("invalid backend address '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConvertError::Config(format!(
            "backend address '{raw}' must use http or https"
        )));
    }
    Ok(trimmed.to_string())
}

impl HttpJobClient {
    /// Build a client from the configuration.
    ///
    /// Fails with [`ConvertError::Config`] when no base address is set, so a
    /// misconfigured process stops before any request is attempted.
    pub fn new(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let base = normalize_base_url(config.require_base_url()?)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;

        debug!("Job client targets {}", base);
        Ok(Self {
            http,
            base,
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Turn a non-success response into `ConvertError::Http`, optionally
/// keeping the body text.
async fn check_status(
    operation: &'static str,
    res: Response,
    keep_body: bool,
) -> Result<Response, ConvertError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = if keep_body {
        res.text().await.unwrap_or_default()
    } else {
        String::new()
    };
    Err(ConvertError::Http {
        operation,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl JobApi for HttpJobClient {
    async fn create_job(&self) -> Result<CreatedJob, ConvertError> {
        const OP: &str = "createJob";
        let res = self
            .http
            .post(self.url("/v1/jobs"))
            .send()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        let res = check_status(OP, res, false).await?;
        let job: CreatedJob = res.json().await.map_err(|e| ConvertError::Decode {
            operation: OP,
            detail: e.to_string(),
        })?;
        info!("Created job {}", job.job_id);
        Ok(job)
    }

    async fn upload_file(
        &self,
        job_id: &str,
        file: &SourceFile,
        options: &ConversionOptions,
        progress: UploadProgressFn,
    ) -> Result<UploadReceipt, ConvertError> {
        const OP: &str = "uploadFile";
        let total = file.size();
        let data = file.data().clone();
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
            .collect();

        let mut sent = 0u64;
        let body = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            progress(TransferProgress { sent, total });
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.name().to_string())
            .mime_str(ACCEPTED_MEDIA_TYPE)
            .map_err(|e| ConvertError::Internal(format!("multipart: {e}")))?;

        let mut form = Form::new().part("file", part);
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }

        info!("Uploading {} ({} bytes) to job {}", file.name(), total, job_id);
        let res = self
            .http
            .post(self.url(&format!("/v1/jobs/{job_id}/file")))
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        let res = check_status(OP, res, true).await?;

        let text = res
            .text()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        if text.trim().is_empty() {
            return Ok(UploadReceipt::default());
        }
        serde_json::from_str(&text).map_err(|e| ConvertError::Decode {
            operation: OP,
            detail: e.to_string(),
        })
    }

    async fn get_status(&self, job_id: &str) -> Result<RemoteStatus, ConvertError> {
        const OP: &str = "getStatus";
        let res = self
            .http
            .get(self.url(&format!("/v1/jobs/{job_id}")))
            .send()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        let res = check_status(OP, res, false).await?;
        let status: RemoteStatus = res.json().await.map_err(|e| ConvertError::Decode {
            operation: OP,
            detail: e.to_string(),
        })?;
        debug!(
            "Job {}: {:?} progress={:?} stage={:?}",
            job_id, status.status, status.progress, status.stage
        );
        Ok(status)
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultStream, ConvertError> {
        const OP: &str = "fetchResult";
        let res = self
            .http
            .get(self.result_url(job_id))
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        let res = check_status(OP, res, false).await?;
        let s = res
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ConvertError::from_reqwest(OP, e)));
        Ok(Box::pin(s))
    }

    fn result_url(&self, job_id: &str) -> String {
        self.url(&format!("/v1/jobs/{job_id}/result"))
    }

    async fn health_check(&self) -> Result<serde_json::Value, ConvertError> {
        const OP: &str = "healthCheck";
        let res = self
            .http
            .get(self.url("/v1/smoke_test_backend"))
            .send()
            .await
            .map_err(|e| ConvertError::from_reqwest(OP, e))?;
        let res = check_status(OP, res, false).await?;
        res.json().await.map_err(|e| ConvertError::Decode {
            operation: OP,
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_trimmed() {
        assert_eq!(
            normalize_base_url("https://ocr.example.com///").unwrap(),
            "https://ocr.example.com"
        );
        assert_eq!(
            normalize_base_url(" http://localhost:8080/api/ ").unwrap(),
            "http://localhost:8080/api"
        );
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(matches!(
            normalize_base_url("ftp://ocr.example.com"),
            Err(ConvertError::Config(_))
        ));
        assert!(matches!(normalize_base_url("/"), Err(ConvertError::Config(_))));
    }

    #[test]
    fn client_requires_base_url() {
        let err = HttpJobClient::new(&ConverterConfig::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn result_url_is_derived_from_base() {
        let config = ConverterConfig::builder()
            .base_url("https://ocr.example.com/")
            .build()
            .unwrap();
        let client = HttpJobClient::new(&config).unwrap();
        assert_eq!(
            client.result_url("abc"),
            "https://ocr.example.com/v1/jobs/abc/result"
        );
    }

    #[test]
    fn remote_status_variants() {
        let s: RemoteStatus =
            serde_json::from_str(r#"{"status":"processing","progress":42.6,"stage":"OCR"}"#)
                .unwrap();
        assert_eq!(s.status, RemoteState::InProgress("processing".into()));
        assert_eq!(s.progress, Some(43));
        assert_eq!(s.stage.as_deref(), Some("OCR"));

        let s: RemoteStatus = serde_json::from_str(r#"{"status":"DONE"}"#).unwrap();
        assert_eq!(s.status, RemoteState::Succeeded);
        assert_eq!(s.progress, None);

        let s: RemoteStatus =
            serde_json::from_str(r#"{"status":"failed","message":"bad scan"}"#).unwrap();
        assert_eq!(s.status, RemoteState::Failed);
        assert_eq!(s.error.as_deref(), Some("bad scan"));

        let s: RemoteStatus =
            serde_json::from_str(r#"{"status":"warming_up","step":"Queue","progress":null}"#)
                .unwrap();
        assert!(matches!(s.status, RemoteState::InProgress(_)));
        assert_eq!(s.stage.as_deref(), Some("Queue"));
    }

    #[test]
    fn progress_is_clamped() {
        let s: RemoteStatus = serde_json::from_str(r#"{"status":"running","progress":140}"#).unwrap();
        assert_eq!(s.progress, Some(100));
        let s: RemoteStatus = serde_json::from_str(r#"{"status":"running","progress":-3}"#).unwrap();
        assert_eq!(s.progress, Some(0));
    }

    #[test]
    fn transfer_percent() {
        assert_eq!(TransferProgress { sent: 0, total: 0 }.percent(), 0);
        assert_eq!(TransferProgress { sent: 50, total: 200 }.percent(), 25);
        assert_eq!(TransferProgress { sent: 300, total: 200 }.percent(), 100);
    }
}
