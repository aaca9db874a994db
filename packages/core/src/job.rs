//! Job domain types for queued generation work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of generation a job performs.
///
/// Used for display and classification only; it never affects dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCategory {
    ImageGeneration,
    TextGeneration,
    AudioGeneration,
}

impl JobCategory {
    /// Get the category name used in serialized snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::ImageGeneration => "image_generation",
            JobCategory::TextGeneration => "text_generation",
            JobCategory::AudioGeneration => "audio_generation",
        }
    }
}

impl std::fmt::Display for JobCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current status of a job in its lifecycle.
///
/// Transitions only ever go `Pending -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting for a free slot.
    #[default]
    Pending,
    /// Job's work has been started.
    Processing,
    /// Job's work resolved successfully.
    Completed,
    /// Job's work failed, timed out or panicked.
    Failed,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a job handed to observers.
///
/// The runnable work and completion callback stay inside the manager; a
/// snapshot only carries what a status display needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Unique identifier for this job.
    pub id: JobId,
    /// What kind of generation this job performs.
    pub category: JobCategory,
    /// Human-readable label.
    pub description: String,
    /// Current status.
    pub status: JobStatus,
    /// Failure message, only present when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the job's work was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Create a new pending job record.
    pub fn new(id: JobId, category: JobCategory, description: impl Into<String>) -> Self {
        Self {
            id,
            category,
            description: description.into(),
            status: JobStatus::Pending,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Wall-clock time the work ran for, once terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        Some((finished - started).num_milliseconds().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_unique_and_parse_back() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(JobId::parse(&a.to_string()).ok(), Some(a));
        assert!(JobId::parse("not-a-ulid").is_err());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));

        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn snapshot_serializes_lowercase_status_and_skips_empty_fields() -> Result<(), serde_json::Error>
    {
        let snapshot = JobSnapshot::new(JobId::new(), JobCategory::AudioGeneration, "Audio for Shot 3");
        let value = serde_json::to_value(&snapshot)?;

        assert_eq!(value["status"], "pending");
        assert_eq!(value["category"], "audio_generation");
        assert!(value.get("error").is_none());
        assert!(value.get("started_at").is_none());
        Ok(())
    }

    #[test]
    fn duration_requires_both_timestamps() {
        let mut snapshot = JobSnapshot::new(JobId::new(), JobCategory::TextGeneration, "Bible");
        assert_eq!(snapshot.duration_ms(), None);

        let started = Utc::now();
        snapshot.started_at = Some(started);
        snapshot.finished_at = Some(started + chrono::Duration::milliseconds(250));
        assert_eq!(snapshot.duration_ms(), Some(250));
    }
}
