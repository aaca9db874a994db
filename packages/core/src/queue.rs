//! Queue configuration and statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, JobSnapshot, JobStatus};

/// Environment variable for [`QueueConfig::max_concurrent`].
pub const ENV_MAX_CONCURRENT: &str = "TASK_QUEUE_MAX_CONCURRENT";
/// Environment variable for [`QueueConfig::task_timeout_secs`].
pub const ENV_TASK_TIMEOUT_SECS: &str = "TASK_QUEUE_TASK_TIMEOUT_SECS";
/// Environment variable for [`QueueConfig::event_capacity`].
pub const ENV_EVENT_CAPACITY: &str = "TASK_QUEUE_EVENT_CAPACITY";

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of jobs in `processing` at once.
    ///
    /// Keeps outstanding calls to the generation service under its rate limit.
    pub max_concurrent: usize,
    /// Optional per-job time limit (seconds). Exceeding it fails the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,
    /// Buffer size of the broadcast event channel.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            task_timeout_secs: None,
            event_capacity: 1024,
        }
    }
}

impl QueueConfig {
    /// Set the concurrency cap.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the per-job timeout.
    pub fn with_task_timeout(mut self, timeout_secs: u64) -> Self {
        self.task_timeout_secs = Some(timeout_secs);
        self
    }

    /// Set the broadcast channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Per-job timeout as a [`Duration`].
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    /// Check that the configuration can drive a queue.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent",
                reason: "must be at least 1".into(),
            });
        }
        if self.task_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "task_timeout_secs",
                reason: "must be at least 1 second when set".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Load configuration from the process environment.
    ///
    /// Unset or blank variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_concurrent = match value(ENV_MAX_CONCURRENT) {
            Some(raw) => parse_number(ENV_MAX_CONCURRENT, &raw)?,
            None => defaults.max_concurrent,
        };
        let task_timeout_secs = match value(ENV_TASK_TIMEOUT_SECS) {
            Some(raw) => Some(parse_number(ENV_TASK_TIMEOUT_SECS, &raw)?),
            None => defaults.task_timeout_secs,
        };
        let event_capacity = match value(ENV_EVENT_CAPACITY) {
            Some(raw) => parse_number(ENV_EVENT_CAPACITY, &raw)?,
            None => defaults.event_capacity,
        };

        let config = Self {
            max_concurrent,
            task_timeout_secs,
            event_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse {
        key,
        value: raw.to_string(),
    })
}

/// Counts of jobs per status, as shown by a status monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Number of pending jobs.
    pub pending: usize,
    /// Number of jobs being processed.
    pub processing: usize,
    /// Number of completed jobs still in the queue.
    pub completed: usize,
    /// Number of failed jobs still in the queue.
    pub failed: usize,
}

impl QueueStats {
    /// Tally the given jobs.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a JobSnapshot>) -> Self {
        let mut stats = Self::default();
        for job in jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Total jobs in the queue.
    pub fn total(&self) -> usize {
        self.outstanding() + self.finished()
    }

    /// Jobs not yet terminal (pending + processing).
    pub fn outstanding(&self) -> usize {
        self.pending + self.processing
    }

    /// Terminal jobs (completed + failed).
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Whether any work is queued or running.
    pub fn is_working(&self) -> bool {
        self.outstanding() > 0
    }

    /// Share of jobs that reached a terminal state, 0-100.
    pub fn progress_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.finished() as f64 / total as f64) * 100.0
        }
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.finished();
        if finished == 0 {
            None
        } else {
            Some((self.completed as f64 / finished as f64) * 100.0)
        }
    }
}
