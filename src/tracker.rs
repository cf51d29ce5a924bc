//! Progress tracker: drives one submit cycle from job creation to a terminal
//! state.
//!
//! ## Phases
//!
//! ```text
//! create_job ──▶ upload_file ──▶ get_status ─┬─▶ sleep (backoff) ──▶ get_status …
//!                (progress events)            ├─▶ Ready
//!                                             └─▶ Error (failure / timeout)
//! ```
//!
//! Every state change goes through [`Cycle::apply`], which stamps it with the
//! cycle's ticket. Once a retry or a newer submission has superseded the
//! cycle, `apply` returns [`ConvertError::Cancelled`] and the tracker unwinds
//! without issuing further calls.
//!
//! Remote failures never escape this module: they become a single `Error`
//! transition carrying the error's display text.

use crate::client::{JobApi, RemoteState, RemoteStatus, TransferProgress, UploadProgressFn};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::job::{JobSnapshot, JobStatus};
use crate::progress::ProgressCallback;
use crate::source::SourceFile;
use crate::state::{Applied, CycleTicket, JobEvent, JobStateMachine, DEFAULT_ERROR_MESSAGE};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Lock the machine, recovering the guard if a callback panicked while it
/// was held elsewhere.
pub(crate) fn lock(machine: &Mutex<JobStateMachine>) -> MutexGuard<'_, JobStateMachine> {
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One submit cycle's write access to the shared state machine.
pub(crate) struct Cycle<'a> {
    ticket: CycleTicket,
    machine: &'a Mutex<JobStateMachine>,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(
        ticket: CycleTicket,
        machine: &'a Mutex<JobStateMachine>,
        callback: Option<&'a ProgressCallback>,
    ) -> Self {
        Self {
            ticket,
            machine,
            callback,
        }
    }

    fn is_current(&self) -> bool {
        lock(self.machine).is_current(self.ticket)
    }

    /// Apply `event`, then notify the callback outside the lock.
    fn apply(&self, event: JobEvent) -> Result<JobSnapshot, ConvertError> {
        let created = matches!(event, JobEvent::JobCreated { .. });
        let (applied, snap) = {
            let mut machine = lock(self.machine);
            let applied = machine.apply(self.ticket, event)?;
            (applied, machine.snapshot())
        };

        match applied {
            Applied::Stale => {
                debug!(
                    "Discarding update from superseded cycle {}",
                    self.ticket.generation()
                );
                Err(ConvertError::Cancelled)
            }
            Applied::Changed { from, to } => {
                if let Some(cb) = self.callback {
                    notify(cb.as_ref(), from, to, &snap, created);
                }
                Ok(snap)
            }
        }
    }

    /// Turn a failure into the matching `Error` transition.
    ///
    /// Cancellation and invariant violations are passed through unchanged.
    fn fail(&self, err: ConvertError) -> Result<(), ConvertError> {
        let message = err.to_string();
        let event = match err {
            ConvertError::Cancelled | ConvertError::InvalidTransition { .. } => return Err(err),
            ConvertError::Timeout { .. } => JobEvent::PollTimeout { message },
            ConvertError::RemoteFailed { .. } => JobEvent::TerminalFailure { message },
            _ => JobEvent::TransportFailure { message },
        };
        warn!("Conversion failed: {}", event_message(&event));
        self.apply(event).map(|_| ())
    }
}

fn event_message(event: &JobEvent) -> &str {
    match event {
        JobEvent::TransportFailure { message }
        | JobEvent::TerminalFailure { message }
        | JobEvent::PollTimeout { message } => message,
        _ => "",
    }
}

pub(crate) fn notify(
    cb: &dyn crate::progress::JobProgressCallback,
    from: JobStatus,
    to: JobStatus,
    snap: &JobSnapshot,
    created: bool,
) {
    if from != to {
        cb.on_status_change(from, to);
    }
    match to {
        JobStatus::Uploading if created => {
            if let Some(id) = snap.id.as_deref() {
                cb.on_job_created(id);
            }
        }
        JobStatus::Uploading => cb.on_upload_progress(snap.progress),
        JobStatus::Processing => cb.on_processing(snap.stage.as_deref().unwrap_or(""), snap.progress),
        JobStatus::Ready => cb.on_ready(snap.id.as_deref().unwrap_or("")),
        JobStatus::Error => cb.on_error(
            snap.error_message
                .as_deref()
                .unwrap_or(DEFAULT_ERROR_MESSAGE),
        ),
        JobStatus::Idle => {}
    }
}

/// Drive a freshly submitted cycle to `Ready` or `Error`.
///
/// Returns `Ok(())` for both terminal outcomes; `Err` only when the cycle
/// was superseded or an invariant was violated.
pub(crate) async fn run_cycle(
    api: &dyn JobApi,
    config: &ConverterConfig,
    cycle: &Cycle<'_>,
    file: &SourceFile,
) -> Result<(), ConvertError> {
    let job_id = match upload_phase(api, config, cycle, file).await {
        Ok(id) => id,
        Err(e) => return cycle.fail(e),
    };
    match poll_phase(api, config, cycle, &job_id).await {
        Ok(()) => Ok(()),
        Err(e) => cycle.fail(e),
    }
}

/// Create the job and transfer the file. Returns the backend job id.
async fn upload_phase(
    api: &dyn JobApi,
    config: &ConverterConfig,
    cycle: &Cycle<'_>,
    file: &SourceFile,
) -> Result<String, ConvertError> {
    let created = api.create_job().await?;
    let job_id = created.job_id;
    cycle.apply(JobEvent::JobCreated { id: job_id.clone() })?;

    let (tx, mut rx) = watch::channel(TransferProgress::default());
    let report: UploadProgressFn = Arc::new(move |p| {
        tx.send_replace(p);
    });

    // The upload future borrows `job_id`; it is dropped at the end of this block.
    let receipt = {
        let upload = api.upload_file(&job_id, file, &config.options, report);
        tokio::pin!(upload);

        let mut reporting = true;
        loop {
            tokio::select! {
                biased;
                res = &mut upload => break res?,
                changed = rx.changed(), if reporting => {
                    if changed.is_err() {
                        reporting = false;
                        continue;
                    }
                    // 100 is reserved for the acknowledged upload.
                    let percent = rx.borrow_and_update().percent().min(99);
                    cycle.apply(JobEvent::UploadProgress { percent })?;
                }
            }
        }
    };
    debug!("Upload receipt for job {}: {:?}", job_id, receipt);

    cycle.apply(JobEvent::UploadProgress { percent: 100 })?;
    cycle.apply(JobEvent::UploadComplete {
        first_stage: config.initial_stage_label.clone(),
    })?;
    info!("Upload of {} complete; job {} is processing", file.name(), job_id);
    Ok(job_id)
}

/// Poll until the backend reports a terminal status or the budget runs out.
async fn poll_phase(
    api: &dyn JobApi,
    config: &ConverterConfig,
    cycle: &Cycle<'_>,
    job_id: &str,
) -> Result<(), ConvertError> {
    let started = Instant::now();
    let max_wait = config.max_wait();
    let timed_out = || ConvertError::Timeout {
        waited_secs: max_wait.as_secs(),
    };
    let mut interval = config.poll_interval();
    let mut polls = 0u32;

    loop {
        let remaining = max_wait.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(timed_out());
        }
        sleep(interval.min(remaining)).await;

        if !cycle.is_current() {
            return Err(ConvertError::Cancelled);
        }
        let remaining = max_wait.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(timed_out());
        }

        polls += 1;
        let status: RemoteStatus = timeout(remaining, api.get_status(job_id))
            .await
            .map_err(|_| timed_out())??;

        match status.status {
            RemoteState::Succeeded => {
                cycle.apply(JobEvent::TerminalSuccess)?;
                info!("Job {} ready after {} polls", job_id, polls);
                return Ok(());
            }
            RemoteState::Failed => {
                return Err(ConvertError::RemoteFailed {
                    message: status
                        .error
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
                });
            }
            RemoteState::InProgress(raw) => {
                let snap = cycle.apply(JobEvent::StatusUpdate {
                    stage: status.stage,
                    percent: status.progress,
                })?;
                debug!(
                    "Job {} {}: {}% {}",
                    job_id,
                    raw,
                    snap.progress,
                    snap.stage.as_deref().unwrap_or("")
                );
            }
        }

        interval = (interval * 2).min(config.max_poll_interval());
    }
}
