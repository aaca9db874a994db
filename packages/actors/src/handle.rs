//! Client handle for the task queue.

use std::sync::Arc;

use ractor::{Actor, ActorRef, RpcReplyPort};
use task_core::{JobId, JobSnapshot, QueueConfig, QueueEvent, QueueStats};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::listeners::{ListenerSet, Subscription};
use crate::manager_actor::{ManagerArgs, TaskManagerActor};
use crate::messages::{ManagerMessage, QueueError};
use crate::task::{JobRequest, Task};

/// Handle to a running task queue.
///
/// Cheap to clone; every clone talks to the same manager. Build one in the
/// application's composition root and pass it to whatever needs to submit or
/// observe jobs.
#[derive(Clone)]
pub struct TaskQueue {
    actor: ActorRef<ManagerMessage>,
    listeners: ListenerSet,
    event_tx: broadcast::Sender<QueueEvent>,
    config: Arc<QueueConfig>,
}

impl TaskQueue {
    /// Validate `config` and spawn the manager actor.
    ///
    /// The returned join handle completes once the manager has stopped.
    pub async fn start(config: QueueConfig) -> Result<(Self, JoinHandle<()>), QueueError> {
        config.validate()?;

        let listeners = ListenerSet::default();
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let args = ManagerArgs {
            config: config.clone(),
            listeners: listeners.clone(),
            event_tx: event_tx.clone(),
        };

        let (actor, handle) = Actor::spawn(None, TaskManagerActor, args)
            .await
            .map_err(|e| QueueError::Spawn(e.to_string()))?;

        Ok((
            Self {
                actor,
                listeners,
                event_tx,
                config: Arc::new(config),
            },
            handle,
        ))
    }

    /// Queue a job and return its ID without waiting for it to run.
    ///
    /// The job is accepted even when every slot is busy; it waits as
    /// `pending`. Fails only if the queue has been shut down.
    pub fn submit<T: Task>(&self, request: JobRequest<T>) -> Result<JobId, QueueError> {
        let (job, task) = request.into_queued();
        let job_id = job.id;
        self.actor
            .send_message(ManagerMessage::Submit { job, task })
            .map_err(|_| QueueError::Stopped)?;
        Ok(job_id)
    }

    /// Remove every pending job. Running jobs are left to finish.
    ///
    /// Returns how many jobs were removed.
    pub async fn cancel_all(&self) -> Result<usize, QueueError> {
        self.call(|reply| ManagerMessage::CancelAll { reply }).await
    }

    /// Remove every completed or failed job.
    pub async fn clear_finished(&self) -> Result<usize, QueueError> {
        self.call(|reply| ManagerMessage::ClearFinished { reply }).await
    }

    /// Snapshots of all jobs in submission order.
    pub async fn jobs(&self) -> Result<Vec<JobSnapshot>, QueueError> {
        self.call(|reply| ManagerMessage::ListJobs { reply }).await
    }

    /// Snapshot of a single job, if it is still in the queue.
    pub async fn job(&self, job_id: JobId) -> Result<Option<JobSnapshot>, QueueError> {
        self.call(|reply| ManagerMessage::GetJob { job_id, reply })
            .await
    }

    /// Number of jobs currently processing.
    pub async fn active_count(&self) -> Result<usize, QueueError> {
        self.call(|reply| ManagerMessage::GetActiveCount { reply })
            .await
    }

    /// Per-status job counts.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.call(|reply| ManagerMessage::GetStats { reply }).await
    }

    /// Register a listener called after every change to the queue.
    ///
    /// Listeners run synchronously on the manager right after the change is
    /// applied, so they must not block.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stream of the same events the listeners receive.
    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    /// Configuration the queue was started with.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Stop the manager. Work already running is not aborted, but its
    /// result is discarded.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down task queue");
        self.actor.stop(None);
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(RpcReplyPort<T>) -> ManagerMessage,
    ) -> Result<T, QueueError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(message(tx.into()))
            .map_err(|_| QueueError::Stopped)?;
        rx.await.map_err(|_| QueueError::Stopped)
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("actor", &self.actor.get_id())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use task_core::{JobCategory, JobStatus, TaskError};

    use super::*;
    use crate::task::task_fn;
    use crate::worker;

    async fn outcome_of<T: Task>(task: T) -> worker::JobOutcome {
        let (_, queued) = JobRequest::new(JobCategory::TextGeneration, "Result", task).into_queued();
        worker::execute(queued, None).await
    }

    async fn jobs_settled(queue: &TaskQueue, count: usize) -> Result<Vec<JobSnapshot>, QueueError> {
        for _ in 0..500 {
            let jobs = queue.jobs().await?;
            if jobs.len() == count && jobs.iter().all(|job| job.status.is_terminal()) {
                return Ok(jobs);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        queue.jobs().await
    }

    #[tokio::test]
    async fn stray_results_do_not_move_jobs_backwards() -> Result<(), Box<dyn std::error::Error>> {
        let config = QueueConfig::default().with_max_concurrent(1);
        let (queue, _handle) = TaskQueue::start(config).await?;
        let mut events = queue.events();

        let (gate, gate_rx) = tokio::sync::oneshot::channel::<()>();
        let running = queue.submit(JobRequest::new(
            JobCategory::ImageGeneration,
            "Shot 1",
            task_fn(move || async move {
                let _ = gate_rx.await;
                Ok::<_, TaskError>(())
            }),
        ))?;
        let waiting = queue.submit(JobRequest::new(
            JobCategory::ImageGeneration,
            "Shot 2",
            task_fn(|| async { Ok::<_, TaskError>(()) }),
        ))?;

        // A result for a job that never started is ignored.
        let outcome = outcome_of(task_fn(|| async { Err::<(), _>(TaskError::new("stale")) })).await;
        queue
            .actor
            .send_message(ManagerMessage::Finished { job_id: waiting, outcome })
            .map_err(|_| QueueError::Stopped)?;
        assert_eq!(queue.job(waiting).await?.map(|job| job.status), Some(JobStatus::Pending));
        assert_eq!(queue.active_count().await?, 1);

        let _ = gate.send(());
        let jobs = jobs_settled(&queue, 2).await?;
        assert!(jobs.iter().all(|job| job.status == JobStatus::Completed));

        // A second report for a finished job changes nothing either.
        let outcome = outcome_of(task_fn(|| async { Err::<(), _>(TaskError::new("late")) })).await;
        queue
            .actor
            .send_message(ManagerMessage::Finished { job_id: running, outcome })
            .map_err(|_| QueueError::Stopped)?;
        let job = queue.job(running).await?;
        assert!(job.is_some_and(|job| job.status == JobStatus::Completed && job.error.is_none()));
        assert_eq!(queue.active_count().await?, 0);

        let mut terminal = 0;
        while let Ok(event) = events.try_recv() {
            if event.is_terminal() {
                terminal += 1;
            }
        }
        assert_eq!(terminal, 2);
        Ok(())
    }
}
