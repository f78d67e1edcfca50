use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::problem::{Problem, ProblemPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Discriminant of a job payload as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "tsk_cgrv")]
    ClassicalGravitation,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::ClassicalGravitation => write!(f, "classical gravitation"),
        }
    }
}

/// Validated work carried by a job, one variant per [`JobKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    ClassicalGravitation(Problem),
}

impl JobPayload {
    /// Validate a raw payload for `kind`.
    pub fn build(kind: JobKind, problem: &ProblemPayload) -> Result<Self> {
        match kind {
            JobKind::ClassicalGravitation => {
                Problem::build(problem).map(JobPayload::ClassicalGravitation)
            }
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::ClassicalGravitation(_) => JobKind::ClassicalGravitation,
        }
    }
}

/// One solve request scoped to a session.
#[derive(Debug, Clone)]
pub struct Job {
    pub session_id: String,
    pub job_id: String,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(session_id: impl Into<String>, job_id: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            session_id: session_id.into(),
            job_id: job_id.into(),
            payload,
            status: JobStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn classical_gravitation(
        session_id: impl Into<String>,
        job_id: impl Into<String>,
        problem: Problem,
    ) -> Self {
        Self::new(session_id, job_id, JobPayload::ClassicalGravitation(problem))
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}
