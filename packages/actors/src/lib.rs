//! Actor-backed task queue for generation jobs.
//!
//! A single manager actor owns the ordered job list. Its mailbox serializes
//! every mutation, so picking the next pending job and marking it
//! `processing` can never race. Work runs on spawned tokio tasks and reports
//! back to the actor when it resolves.
//!
//! # Architecture
//!
//! - `TaskQueue` - Cloneable handle used by the rest of the application
//! - `TaskManagerActor` - Owns jobs, enforces the concurrency cap, notifies
//! - `Task` - The opaque unit of work a job runs exactly once
//!
//! # Usage
//!
//! ```ignore
//! use task_actors::{JobRequest, TaskQueue, task_fn};
//! use task_core::{JobCategory, QueueConfig};
//!
//! let (queue, _handle) = TaskQueue::start(QueueConfig::default()).await?;
//!
//! let request = JobRequest::new(
//!     JobCategory::ImageGeneration,
//!     "Start Frame for Shot 1",
//!     task_fn(|| async { Ok::<_, task_core::TaskError>("frames/1.png".to_string()) }),
//! )
//! .on_complete(|path| println!("stored {path}"));
//!
//! let job_id = queue.submit(request)?;
//! ```

mod handle;
mod listeners;
mod manager_actor;
mod messages;
mod task;
mod worker;

pub use handle::TaskQueue;
pub use listeners::Subscription;
pub use messages::QueueError;
pub use task::{FnTask, JobRequest, Task, task_fn};

/// Re-export core types for convenience.
pub use task_core::{
    JobCategory, JobId, JobSnapshot, JobStatus, QueueConfig, QueueEvent, QueueStats, TaskError,
};
