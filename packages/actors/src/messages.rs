//! Message types for the manager actor.

use ractor::RpcReplyPort;
use task_core::{ConfigError, JobId, JobSnapshot, QueueStats};

use crate::task::QueuedTask;
use crate::worker::JobOutcome;

/// Messages for the TaskManagerActor.
#[derive(Debug)]
pub(crate) enum ManagerMessage {
    /// Append a new pending job and try to dispatch.
    Submit { job: JobSnapshot, task: QueuedTask },

    /// A job's work resolved, successfully or not.
    Finished { job_id: JobId, outcome: JobOutcome },

    /// Drop every pending job; reply with how many were removed.
    CancelAll { reply: RpcReplyPort<usize> },

    /// Drop every completed or failed job; reply with how many were removed.
    ClearFinished { reply: RpcReplyPort<usize> },

    /// List all jobs in submission order.
    ListJobs { reply: RpcReplyPort<Vec<JobSnapshot>> },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<JobSnapshot>>,
    },

    /// Number of jobs currently processing.
    GetActiveCount { reply: RpcReplyPort<usize> },

    /// Per-status job counts.
    GetStats { reply: RpcReplyPort<QueueStats> },
}

/// Error type for queue operations.
///
/// Job failures never show up here; they are recorded on the job itself.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Task queue has stopped")]
    Stopped,

    #[error("Invalid queue configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start task queue: {0}")]
    Spawn(String),
}
