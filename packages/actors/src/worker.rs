//! Execution of a single job's work outside the manager actor.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use ractor::ActorRef;
use task_core::{JobId, TaskError};

use crate::messages::ManagerMessage;
use crate::task::{Completion, QueuedTask};

/// Result of running a job's work, sent back to the manager.
pub(crate) struct JobOutcome(Result<Completion, TaskError>);

impl JobOutcome {
    pub(crate) fn into_result(self) -> Result<Completion, TaskError> {
        self.0
    }
}

impl fmt::Debug for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Ok(_) => f.write_str("JobOutcome(Ok)"),
            Err(e) => write!(f, "JobOutcome(Err({:?}))", e),
        }
    }
}

/// Start a job's work on its own tokio task.
///
/// Returns immediately; the outcome is reported to `manager` as a
/// `Finished` message.
pub(crate) fn spawn(
    manager: ActorRef<ManagerMessage>,
    job_id: JobId,
    task: QueuedTask,
    timeout: Option<Duration>,
) {
    tokio::spawn(async move {
        let outcome = execute(task, timeout).await;
        if manager
            .send_message(ManagerMessage::Finished { job_id, outcome })
            .is_err()
        {
            tracing::debug!("Manager stopped before job {} reported back", job_id);
        }
    });
}

/// Run the work, turning panics and timeouts into task failures.
pub(crate) async fn execute(task: QueuedTask, timeout: Option<Duration>) -> JobOutcome {
    let guarded = async move {
        match AssertUnwindSafe(task.start()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    };

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, guarded)
            .await
            .unwrap_or_else(|_| Err(TaskError::TimedOut(limit))),
        None => guarded.await,
    };

    JobOutcome(result)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
