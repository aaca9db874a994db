//! Manager actor owning the job list and the dispatch loop.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use task_core::{JobId, JobSnapshot, JobStatus, QueueConfig, QueueEvent, QueueStats};
use tokio::sync::broadcast;

use crate::listeners::ListenerSet;
use crate::messages::ManagerMessage;
use crate::task::{Completion, QueuedTask};
use crate::worker::{self, JobOutcome, panic_message};

/// Arguments for spawning the manager actor.
pub(crate) struct ManagerArgs {
    pub config: QueueConfig,
    pub listeners: ListenerSet,
    pub event_tx: broadcast::Sender<QueueEvent>,
}

/// State for the manager actor.
pub(crate) struct ManagerState {
    config: QueueConfig,
    /// Every job still in the queue, in submission order.
    jobs: Vec<JobSnapshot>,
    /// Work of pending jobs, oldest first.
    pending: VecDeque<(JobId, QueuedTask)>,
    /// Jobs currently processing.
    active: usize,
    listeners: ListenerSet,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl ManagerState {
    fn new(args: ManagerArgs) -> Self {
        Self {
            config: args.config,
            jobs: Vec::new(),
            pending: VecDeque::new(),
            active: 0,
            listeners: args.listeners,
            event_tx: args.event_tx,
        }
    }

    /// Tell listeners and stream subscribers about a mutation.
    fn notify(&self, event: QueueEvent) {
        tracing::debug!("{}", event.description());
        self.listeners.notify(&event);
        // No receivers is fine; listeners may be the only observers.
        let _ = self.event_tx.send(event);
    }

    fn job_mut(&mut self, job_id: JobId) -> Option<&mut JobSnapshot> {
        self.jobs.iter_mut().find(|job| job.id == job_id)
    }

    fn submit(&mut self, myself: &ActorRef<ManagerMessage>, job: JobSnapshot, task: QueuedTask) {
        let job_id = job.id;
        self.jobs.push(job.clone());
        self.pending.push_back((job_id, task));

        self.notify(QueueEvent::JobSubmitted {
            job,
            timestamp: Utc::now(),
        });
        self.dispatch(myself);
    }

    /// Start pending jobs, oldest first, until the cap is reached.
    fn dispatch(&mut self, myself: &ActorRef<ManagerMessage>) {
        while self.active < self.config.max_concurrent {
            let Some((job_id, task)) = self.pending.pop_front() else {
                break;
            };

            let now = Utc::now();
            let Some(job) = self.job_mut(job_id) else {
                tracing::error!("Pending job {} missing from queue, dropping its work", job_id);
                continue;
            };
            if !advance(job, JobStatus::Processing) {
                continue;
            }
            job.started_at = Some(now);

            self.active += 1;
            self.notify(QueueEvent::JobStarted {
                job_id,
                active: self.active,
                timestamp: now,
            });

            worker::spawn(myself.clone(), job_id, task, self.config.task_timeout());
        }
    }

    fn finish(&mut self, myself: &ActorRef<ManagerMessage>, job_id: JobId, outcome: JobOutcome) {
        let Some(job) = self.job_mut(job_id) else {
            tracing::warn!("Finished job {} is no longer in the queue", job_id);
            return;
        };
        let result = outcome.into_result();
        let next = if result.is_ok() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        if !advance(job, next) {
            return;
        }

        let now = Utc::now();
        job.finished_at = Some(now);
        let duration_ms = job.duration_ms().unwrap_or(0);

        let event = match result {
            Ok(completion) => {
                job.error = None;
                run_completion(job_id, completion);

                QueueEvent::JobCompleted {
                    job_id,
                    duration_ms,
                    timestamp: now,
                }
            }
            Err(err) => {
                let message = err.job_message();
                tracing::warn!("Job {} failed: {}", job_id, message);
                job.error = Some(message.clone());

                QueueEvent::JobFailed {
                    job_id,
                    error: message,
                    duration_ms,
                    timestamp: now,
                }
            }
        };

        self.active = self.active.saturating_sub(1);
        self.notify(event);
        self.dispatch(myself);
    }

    fn cancel_all(&mut self) -> usize {
        let job_ids: Vec<JobId> = self.pending.drain(..).map(|(job_id, _)| job_id).collect();
        self.jobs.retain(|job| job.status != JobStatus::Pending);

        let removed = job_ids.len();
        if removed > 0 {
            tracing::info!("Cancelled {} pending jobs", removed);
        }
        self.notify(QueueEvent::PendingCancelled {
            job_ids,
            timestamp: Utc::now(),
        });
        removed
    }

    fn clear_finished(&mut self) -> usize {
        let job_ids: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|job| job.status.is_terminal())
            .map(|job| job.id)
            .collect();
        self.jobs.retain(|job| !job.status.is_terminal());

        self.notify(QueueEvent::FinishedCleared {
            job_ids: job_ids.clone(),
            timestamp: Utc::now(),
        });
        job_ids.len()
    }
}

/// Move `job` to `next` if that is a forward step of its lifecycle.
fn advance(job: &mut JobSnapshot, next: JobStatus) -> bool {
    if !job.status.can_transition_to(next) {
        tracing::warn!("Ignoring move of job {} from {} to {}", job.id, job.status, next);
        return false;
    }
    job.status = next;
    true
}

/// Run a completion callback without letting a panic take the actor down.
fn run_completion(job_id: JobId, completion: Completion) {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(completion)) {
        tracing::error!(
            "Completion callback for job {} panicked: {}",
            job_id,
            panic_message(payload.as_ref())
        );
    }
}

/// Actor that owns the queue and runs its dispatch loop.
pub(crate) struct TaskManagerActor;

impl Actor for TaskManagerActor {
    type Msg = ManagerMessage;
    type State = ManagerState;
    type Arguments = ManagerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting task queue manager (max_concurrent = {})",
            args.config.max_concurrent
        );
        Ok(ManagerState::new(args))
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            "Task queue manager stopped ({} pending dropped, {} still running)",
            state.pending.len(),
            state.active
        );
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ManagerMessage::Submit { job, task } => {
                state.submit(&myself, job, task);
            }

            ManagerMessage::Finished { job_id, outcome } => {
                state.finish(&myself, job_id, outcome);
            }

            ManagerMessage::CancelAll { reply } => {
                let _ = reply.send(state.cancel_all());
            }

            ManagerMessage::ClearFinished { reply } => {
                let _ = reply.send(state.clear_finished());
            }

            ManagerMessage::ListJobs { reply } => {
                let _ = reply.send(state.jobs.clone());
            }

            ManagerMessage::GetJob { job_id, reply } => {
                let job = state.jobs.iter().find(|job| job.id == job_id).cloned();
                let _ = reply.send(job);
            }

            ManagerMessage::GetActiveCount { reply } => {
                let _ = reply.send(state.active);
            }

            ManagerMessage::GetStats { reply } => {
                let _ = reply.send(QueueStats::from_jobs(&state.jobs));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use task_core::JobCategory;

    use super::*;

    #[test]
    fn advance_only_steps_forward() {
        let mut job = JobSnapshot::new(JobId::new(), JobCategory::ImageGeneration, "Shot 1");

        assert!(!advance(&mut job, JobStatus::Completed));
        assert_eq!(job.status, JobStatus::Pending);

        assert!(advance(&mut job, JobStatus::Processing));
        assert!(advance(&mut job, JobStatus::Failed));

        assert!(!advance(&mut job, JobStatus::Completed));
        assert!(!advance(&mut job, JobStatus::Processing));
        assert_eq!(job.status, JobStatus::Failed);
    }
}
