//! Runnable task trait and job requests.

use std::fmt;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use task_core::{JobCategory, JobId, JobSnapshot, TaskError};

/// A unit of work run by the queue.
///
/// Implement this trait for anything that performs a call to the generation
/// service. The task is moved into the queue on submission and consumed when
/// its job is dispatched, so it runs at most once.
pub trait Task: Send + 'static {
    /// Value handed to the job's completion callback.
    type Output: Send + 'static;

    /// Run the work.
    fn run(self) -> impl Future<Output = Result<Self::Output, TaskError>> + Send + 'static;
}

/// A task built from an async closure.
pub struct FnTask<F> {
    work: F,
}

impl<F, Fut, T> Task for FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn run(self) -> impl Future<Output = Result<T, TaskError>> + Send + 'static {
        (self.work)()
    }
}

/// Wrap an async closure as a [`Task`].
pub fn task_fn<F, Fut, T>(work: F) -> FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Send + 'static,
{
    FnTask { work }
}

/// Callback deferred until the job has been marked completed.
pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Future of a started task, resolving to its pending completion callback.
pub(crate) type RunFuture = BoxFuture<'static, Result<Completion, TaskError>>;

/// A task with its output type erased so jobs of any kind share one queue.
pub(crate) struct QueuedTask {
    start: Box<dyn FnOnce() -> RunFuture + Send>,
}

impl QueuedTask {
    fn new<T: Task>(task: T, on_complete: Option<Box<dyn FnOnce(T::Output) + Send>>) -> Self {
        Self {
            start: Box::new(move || -> RunFuture {
                async move {
                    let output = task.run().await?;
                    let completion: Completion = Box::new(move || {
                        if let Some(callback) = on_complete {
                            callback(output);
                        }
                    });
                    Ok::<_, TaskError>(completion)
                }
                .boxed()
            }),
        }
    }

    /// Consume the task and start its work.
    pub(crate) fn start(self) -> RunFuture {
        (self.start)()
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueuedTask")
    }
}

/// A job waiting to be submitted: what it is, and the work it runs.
pub struct JobRequest<T: Task> {
    category: JobCategory,
    description: String,
    task: T,
    on_complete: Option<Box<dyn FnOnce(T::Output) + Send>>,
}

impl<T: Task> JobRequest<T> {
    /// Create a request for the given task.
    pub fn new(category: JobCategory, description: impl Into<String>, task: T) -> Self {
        Self {
            category,
            description: description.into(),
            task,
            on_complete: None,
        }
    }

    /// Run `callback` with the task's output once the job has completed.
    ///
    /// Never called when the job fails.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(T::Output) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Split into the pending job record and its erased work.
    pub(crate) fn into_queued(self) -> (JobSnapshot, QueuedTask) {
        let job = JobSnapshot::new(JobId::new(), self.category, self.description);
        (job, QueuedTask::new(self.task, self.on_complete))
    }
}

impl<T: Task> fmt::Debug for JobRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("category", &self.category)
            .field("description", &self.description)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
