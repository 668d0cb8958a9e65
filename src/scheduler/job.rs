use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a scoring job. Terminal states are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    CompletedWithErrors,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::CompletedWithErrors => write!(f, "completed_with_errors"),
        }
    }
}

/// One scoring request for one participant. Consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringJob {
    pub id: Uuid,
    pub participant_key: String,
    pub target_endpoint: String,
    pub cloud_project_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl ScoringJob {
    pub fn new(
        participant_key: impl Into<String>,
        target_endpoint: impl Into<String>,
        cloud_project_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_key: participant_key.into(),
            target_endpoint: target_endpoint.into(),
            cloud_project_id: cloud_project_id.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// In-flight view of a job, as listed on the intake portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub participant_key: String,
    pub display_name: String,
    pub submitted_at: DateTime<Utc>,
    pub state: JobState,
}
