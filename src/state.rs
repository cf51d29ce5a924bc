//! The job state machine.
//!
//! ```text
//!            submit                upload_complete            terminal_success
//!   Idle ───────────▶ Uploading ───────────────────▶ Processing ────────────▶ Ready
//!    ▲                   │                              │                     │
//!    │ retry             │ transport_failure            │ terminal_failure /  │ submit
//!    │                   ▼                              ▼ poll_timeout        ▼
//!    └──────────────── Error ◀──────────────────────────┘                 Uploading
//! ```
//!
//! Every cycle carries a generation number. `submit` and `retry` start a new
//! generation; events stamped with an older one are reported as
//! [`Applied::Stale`] and leave the state untouched. This is what keeps a
//! poll loop that outlived a retry from writing into the next job.

use crate::error::ConvertError;
use crate::job::{JobSnapshot, JobStatus};
use std::fmt;

/// Identifies one submit cycle. Handed out by [`JobStateMachine::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket(u64);

impl CycleTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Events the tracker feeds into an in-flight cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    JobCreated { id: String },
    UploadProgress { percent: u8 },
    UploadComplete { first_stage: String },
    TransportFailure { message: String },
    StatusUpdate { stage: Option<String>, percent: Option<u8> },
    TerminalSuccess,
    TerminalFailure { message: String },
    PollTimeout { message: String },
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobEvent::JobCreated { .. } => "job_created",
            JobEvent::UploadProgress { .. } => "upload_progress",
            JobEvent::UploadComplete { .. } => "upload_complete",
            JobEvent::TransportFailure { .. } => "transport_failure",
            JobEvent::StatusUpdate { .. } => "status_update",
            JobEvent::TerminalSuccess => "terminal_success",
            JobEvent::TerminalFailure { .. } => "terminal_failure",
            JobEvent::PollTimeout { .. } => "poll_timeout",
        };
        f.write_str(s)
    }
}

/// Outcome of feeding an event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The event was applied; `from` is the status before it.
    Changed { from: JobStatus, to: JobStatus },
    /// The event belongs to a superseded cycle and was dropped.
    Stale,
}

/// Fallback shown when the backend fails without saying why.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred during conversion. Please try again.";

/// Canonical state of the single active job.
#[derive(Debug, Default)]
pub struct JobStateMachine {
    job: JobSnapshot,
    generation: u64,
}

impl JobStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.job.clone()
    }

    /// Whether `ticket` still identifies the current cycle.
    pub fn is_current(&self, ticket: CycleTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Start a new cycle: `Idle | Ready → Uploading`.
    ///
    /// Input validation happens before this is called; the machine only
    /// guards the lifecycle.
    pub fn submit(
        &mut self,
        file_name: impl Into<String>,
        file_size: u64,
    ) -> Result<CycleTicket, ConvertError> {
        match self.job.status {
            JobStatus::Idle | JobStatus::Ready => {}
            status @ (JobStatus::Uploading | JobStatus::Processing) => {
                return Err(ConvertError::JobInProgress { status })
            }
            JobStatus::Error => {
                return Err(ConvertError::JobInProgress {
                    status: JobStatus::Error,
                })
            }
        }

        self.generation += 1;
        self.job = JobSnapshot {
            status: JobStatus::Uploading,
            progress: 0,
            file_name: Some(file_name.into()),
            file_size: Some(file_size),
            ..JobSnapshot::default()
        };
        Ok(CycleTicket(self.generation))
    }

    /// Reset to `Idle`, clearing all job-scoped data and invalidating the
    /// current cycle. Returns the status that was left, or `None` if the
    /// machine was already idle.
    pub fn retry(&mut self) -> Option<JobStatus> {
        let from = self.job.status;
        if from == JobStatus::Idle {
            return None;
        }
        self.generation += 1;
        self.job = JobSnapshot::default();
        Some(from)
    }

    /// Apply an event from the cycle identified by `ticket`.
    pub fn apply(&mut self, ticket: CycleTicket, event: JobEvent) -> Result<Applied, ConvertError> {
        if !self.is_current(ticket) {
            return Ok(Applied::Stale);
        }

        let from = self.job.status;
        let job = &mut self.job;

        match (from, event) {
            (JobStatus::Uploading, JobEvent::JobCreated { id }) => {
                if job.id.is_some() {
                    return Err(ConvertError::InvalidTransition {
                        from,
                        event: JobEvent::JobCreated { id },
                    });
                }
                job.id = Some(id);
            }
            (JobStatus::Uploading, JobEvent::UploadProgress { percent }) => {
                job.progress = job.progress.max(percent.min(100));
            }
            (JobStatus::Uploading, JobEvent::UploadComplete { first_stage }) => {
                job.status = JobStatus::Processing;
                job.progress = 0;
                job.stage = Some(first_stage);
            }
            (JobStatus::Processing, JobEvent::StatusUpdate { stage, percent }) => {
                if let Some(stage) = stage.filter(|s| !s.trim().is_empty()) {
                    job.stage = Some(stage);
                }
                if let Some(p) = percent {
                    job.progress = job.progress.max(p.min(100));
                }
            }
            (JobStatus::Processing, JobEvent::TerminalSuccess) => {
                job.status = JobStatus::Ready;
                job.progress = 100;
                job.stage = None;
            }
            (JobStatus::Uploading, JobEvent::TransportFailure { message })
            | (JobStatus::Processing, JobEvent::TransportFailure { message })
            | (JobStatus::Processing, JobEvent::TerminalFailure { message })
            | (JobStatus::Processing, JobEvent::PollTimeout { message }) => {
                job.status = JobStatus::Error;
                job.stage = None;
                job.error_message = Some(non_empty(message));
            }
            (from, event) => return Err(ConvertError::InvalidTransition { from, event }),
        }

        Ok(Applied::Changed {
            from,
            to: self.job.status,
        })
    }
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
