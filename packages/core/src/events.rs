//! Event types emitted after every queue mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobSnapshot};

/// Events emitted by the task queue for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A new job was appended as pending.
    JobSubmitted {
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },
    /// A job was dispatched and its work started.
    JobStarted {
        job_id: JobId,
        active: usize,
        timestamp: DateTime<Utc>,
    },
    /// A job's work resolved successfully.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job's work failed.
    JobFailed {
        job_id: JobId,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// Pending jobs were removed by a bulk cancel.
    PendingCancelled {
        job_ids: Vec<JobId>,
        timestamp: DateTime<Utc>,
    },
    /// Terminal jobs were removed from the queue.
    FinishedCleared {
        job_ids: Vec<JobId>,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            QueueEvent::JobSubmitted { timestamp, .. } => *timestamp,
            QueueEvent::JobStarted { timestamp, .. } => *timestamp,
            QueueEvent::JobCompleted { timestamp, .. } => *timestamp,
            QueueEvent::JobFailed { timestamp, .. } => *timestamp,
            QueueEvent::PendingCancelled { timestamp, .. } => *timestamp,
            QueueEvent::FinishedCleared { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID this event is about, if it concerns a single job.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            QueueEvent::JobSubmitted { job, .. } => Some(job.id),
            QueueEvent::JobStarted { job_id, .. } => Some(*job_id),
            QueueEvent::JobCompleted { job_id, .. } => Some(*job_id),
            QueueEvent::JobFailed { job_id, .. } => Some(*job_id),
            QueueEvent::PendingCancelled { .. } | QueueEvent::FinishedCleared { .. } => None,
        }
    }

    /// Whether this event moved a job into a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueEvent::JobCompleted { .. } | QueueEvent::JobFailed { .. }
        )
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            QueueEvent::JobSubmitted { job, .. } => {
                format!("Job {} submitted: {} ({})", job.id, job.description, job.category)
            }
            QueueEvent::JobStarted { job_id, active, .. } => {
                format!("Job {} started ({} active)", job_id, active)
            }
            QueueEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            QueueEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            QueueEvent::PendingCancelled { job_ids, .. } => {
                format!("Cancelled {} pending jobs", job_ids.len())
            }
            QueueEvent::FinishedCleared { job_ids, .. } => {
                format!("Cleared {} finished jobs", job_ids.len())
            }
        }
    }
}
