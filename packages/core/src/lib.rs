//! Core domain types for the generation task queue.
//!
//! This crate contains shared types used across all packages:
//! - Job identity, category, status and snapshots
//! - Queue configuration and statistics
//! - Events for observers
//! - Error types

mod error;
mod events;
mod job;
mod queue;

pub use error::{ConfigError, TaskError, UNKNOWN_ERROR};
pub use events::QueueEvent;
pub use job::{JobCategory, JobId, JobSnapshot, JobStatus};
pub use queue::{
    ENV_EVENT_CAPACITY, ENV_MAX_CONCURRENT, ENV_TASK_TIMEOUT_SECS, QueueConfig, QueueStats,
};
