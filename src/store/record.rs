use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kernel::Solution;
use crate::postprocess::TrajectoryExport;
use crate::problem::Problem;
use crate::scheduler::{Job, JobKind, JobPayload, JobStatus};

/// Identity and timing of the worker that last touched a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMeta {
    pub worker_id: usize,
    pub name: String,
    pub pid: u32,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

impl WorkerMeta {
    pub fn new(worker_id: usize, elapsed: Duration) -> Self {
        Self {
            worker_id,
            name: format!("gravity-worker-{}", worker_id),
            pid: std::process::id(),
            elapsed,
            finished_at: Utc::now(),
        }
    }
}

/// Value held by the result store for one `(session, job)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Problem the solution belongs to. Absent for records restored from
    /// the trajectory archive.
    pub problem: Option<Problem>,
    pub solution: Solution,
    pub worker: Option<WorkerMeta>,
    pub export: Option<TrajectoryExport>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Placeholder inserted when a job is accepted for dispatch.
    pub fn pending(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            kind: job.kind(),
            status: JobStatus::Pending,
            problem: Some(problem_of(job)),
            solution: Solution::failed(),
            worker: None,
            export: None,
            updated_at: Utc::now(),
        }
    }

    /// Terminal record for a finished solve. Status follows `solution.status`.
    pub fn completed(job: &Job, solution: Solution, worker: WorkerMeta) -> Self {
        Self {
            job_id: job.job_id.clone(),
            kind: job.kind(),
            status: status_of(&solution),
            problem: Some(problem_of(job)),
            solution,
            worker: Some(worker),
            export: None,
            updated_at: Utc::now(),
        }
    }

    /// Record rebuilt from an archived trajectory.
    pub fn restored(job_id: impl Into<String>, kind: JobKind, solution: Solution) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            status: status_of(&solution),
            problem: None,
            solution,
            worker: None,
            export: None,
            updated_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded && self.solution.status
    }
}

fn status_of(solution: &Solution) -> JobStatus {
    if solution.status {
        JobStatus::Succeeded
    } else {
        JobStatus::Failed
    }
}

fn problem_of(job: &Job) -> Problem {
    match &job.payload {
        JobPayload::ClassicalGravitation(problem) => problem.clone(),
    }
}
