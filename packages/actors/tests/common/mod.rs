#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use task_actors::{JobSnapshot, QueueConfig, QueueEvent, Task, TaskError, TaskQueue, task_fn};
use tokio::sync::oneshot;
use tokio::time::Instant;

pub type TestResult = Result<(), Box<dyn Error>>;

pub async fn start_queue(max_concurrent: usize) -> Result<TaskQueue, Box<dyn Error>> {
    let config = QueueConfig::default().with_max_concurrent(max_concurrent);
    let (queue, _handle) = TaskQueue::start(config).await?;
    Ok(queue)
}

/// A task that stays running until the returned sender fires (or is dropped).
pub fn gated() -> (oneshot::Sender<()>, impl Task<Output = ()>) {
    let (tx, rx) = oneshot::channel();
    let task = task_fn(move || async move {
        let _ = rx.await;
        Ok::<_, TaskError>(())
    });
    (tx, task)
}

/// A task that resolves immediately with `value`.
pub fn ready<T: Send + 'static>(value: T) -> impl Task<Output = T> {
    task_fn(move || async move { Ok::<_, TaskError>(value) })
}

/// A task that fails immediately with `error`.
pub fn failing(error: TaskError) -> impl Task<Output = ()> {
    task_fn(move || async move { Err::<(), _>(error) })
}

/// Poll the queue until `done` holds, failing after five seconds.
pub async fn wait_for<F>(queue: &TaskQueue, mut done: F) -> Result<Vec<JobSnapshot>, Box<dyn Error>>
where
    F: FnMut(&[JobSnapshot]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let jobs = queue.jobs().await?;
        if done(&jobs) {
            return Ok(jobs);
        }
        if Instant::now() > deadline {
            return Err(format!("timed out waiting on queue state: {jobs:?}").into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn all_terminal(jobs: &[JobSnapshot]) -> bool {
    !jobs.is_empty() && jobs.iter().all(|job| job.status.is_terminal())
}

/// Collects events delivered to a synchronous listener.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl Recorder {
    pub fn push(&self, event: &QueueEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Short name of an event, for comparing sequences.
pub fn kind(event: &QueueEvent) -> &'static str {
    match event {
        QueueEvent::JobSubmitted { .. } => "submitted",
        QueueEvent::JobStarted { .. } => "started",
        QueueEvent::JobCompleted { .. } => "completed",
        QueueEvent::JobFailed { .. } => "failed",
        QueueEvent::PendingCancelled { .. } => "cancelled",
        QueueEvent::FinishedCleared { .. } => "cleared",
    }
}
