//! The orchestrator: the single owner of the active job.
//!
//! [`Converter`] is the only way to change job state. Callers issue named
//! commands (`submit`, `retry`) and read [`JobSnapshot`]s; the tracker does
//! the rest. A `Converter` is cheap to clone and every clone shares the same
//! job, so one task can run `submit` while another calls `retry`.

use crate::client::{HttpJobClient, JobApi};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::job::{JobSnapshot, JobStatus};
use crate::result;
use crate::source::{validate_submission, SourceFile};
use crate::state::JobStateMachine;
use crate::tracker::{self, lock, Cycle};
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

struct Inner {
    api: Arc<dyn JobApi>,
    config: ConverterConfig,
    machine: Mutex<JobStateMachine>,
}

/// Submits documents and tracks the resulting conversion job.
#[derive(Clone)]
pub struct Converter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.inner.config)
            .field("job", &self.snapshot())
            .finish()
    }
}

impl Converter {
    /// A converter talking HTTP to `config.base_url`.
    ///
    /// Fails with [`ConvertError::Config`] when the base address is missing.
    pub fn new(config: ConverterConfig) -> Result<Self, ConvertError> {
        let api = HttpJobClient::new(&config)?;
        Ok(Self::with_api(Arc::new(api), config))
    }

    /// A converter using a caller-supplied backend binding.
    pub fn with_api(api: Arc<dyn JobApi>, config: ConverterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                machine: Mutex::new(JobStateMachine::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> JobSnapshot {
        lock(&self.inner.machine).snapshot()
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.inner.machine).status()
    }

    /// Submit a document and drive the job until it is `Ready` or `Error`.
    ///
    /// Validation happens first: a non-PDF, an empty file, or missing rights
    /// confirmation returns [`ConvertError::Validation`] without any backend
    /// call and leaves the job untouched. A submission while a job is
    /// uploading, processing, or failed returns
    /// [`ConvertError::JobInProgress`].
    ///
    /// Backend failures and timeouts do **not** produce `Err`: they end the
    /// cycle in `Error` and the returned snapshot carries the message.
    /// `Err(ConvertError::Cancelled)` means a `retry` or newer submission
    /// superseded this cycle while it was in flight.
    pub async fn submit(
        &self,
        file: SourceFile,
        rights_confirmed: bool,
    ) -> Result<JobSnapshot, ConvertError> {
        let config = &self.inner.config;
        validate_submission(&file, rights_confirmed, config.max_file_size_bytes)?;

        let (ticket, from, snap) = {
            let mut machine = lock(&self.inner.machine);
            let from = machine.status();
            let ticket = machine.submit(file.name(), file.size())?;
            (ticket, from, machine.snapshot())
        };
        info!(
            "Submitted {} ({}) as cycle {}",
            file.name(),
            snap.file_size_display().unwrap_or_default(),
            ticket.generation()
        );
        if let Some(cb) = &config.progress_callback {
            tracker::notify(cb.as_ref(), from, snap.status, &snap, false);
        }

        let cycle = Cycle::new(ticket, &self.inner.machine, config.progress_callback.as_ref());
        tracker::run_cycle(self.inner.api.as_ref(), config, &cycle, &file).await?;
        Ok(self.snapshot())
    }

    /// Reset the job to `Idle`, clearing file metadata and any error.
    ///
    /// Any cycle still in flight is invalidated: its pending updates are
    /// discarded and its loop stops at the next step.
    pub fn retry(&self) -> JobSnapshot {
        let (left, snap) = {
            let mut machine = lock(&self.inner.machine);
            let left = machine.retry();
            (left, machine.snapshot())
        };
        if let Some(from) = left {
            info!("Job reset to idle (was {})", from);
            if let Some(cb) = &self.inner.config.progress_callback {
                tracker::notify(cb.as_ref(), from, JobStatus::Idle, &snap, false);
            }
        }
        snap
    }

    /// True iff the job is `Ready`.
    pub fn can_download(&self) -> bool {
        result::can_download(&self.snapshot())
    }

    /// Output filename for the current job's source file.
    pub fn download_name(&self) -> Option<String> {
        self.snapshot()
            .file_name
            .as_deref()
            .map(result::download_name)
    }

    /// Location of the converted document.
    pub fn result_url(&self) -> Result<String, ConvertError> {
        let snap = self.snapshot();
        let id = result::ready_job_id(&snap)?;
        Ok(self.inner.api.result_url(id))
    }

    /// Download the converted document into memory.
    pub async fn fetch_result(&self) -> Result<Bytes, ConvertError> {
        let id = self.ready_job_id()?;
        let mut stream = self.inner.api.fetch_result(&id).await?;
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        debug!("Fetched {} bytes for job {}", buf.len(), id);
        Ok(Bytes::from(buf))
    }

    /// Stream the converted document to `path`. Returns the bytes written.
    ///
    /// Writes to a temporary sibling first and renames it into place, so an
    /// interrupted download never leaves a truncated document at `path`.
    pub async fn download_to(&self, path: impl AsRef<Path>) -> Result<u64, ConvertError> {
        let path = path.as_ref();
        let id = self.ready_job_id()?;
        let write_err = |source| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut stream = self.inner.api.fetch_result(&id).await?;
        let tmp_path = path.with_extension("docx.tmp");
        let mut out = tokio::fs::File::create(&tmp_path).await.map_err(write_err)?;
        let mut written = 0u64;

        let copied: Result<(), ConvertError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                out.write_all(&chunk).await.map_err(write_err)?;
                written += chunk.len() as u64;
            }
            out.flush().await.map_err(write_err)?;
            Ok(())
        }
        .await;
        drop(out);

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        info!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    /// Probe the backend; independent of the job lifecycle.
    pub async fn health_check(&self) -> Result<serde_json::Value, ConvertError> {
        self.inner.api.health_check().await
    }

    fn ready_job_id(&self) -> Result<String, ConvertError> {
        let snap = self.snapshot();
        result::ready_job_id(&snap).map(str::to_string)
    }
}
