use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GravityError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("Numerical divergence: {0}")]
    NumericalDivergence(String),

    #[error("Solve exceeded its time budget of {0:?}")]
    Timeout(std::time::Duration),

    #[error("Job not found: session {session_id}, job {job_id}")]
    NotFound { session_id: String, job_id: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Worker pool intake is full")]
    ResourceExhausted,

    #[error("Scheduler is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GravityError {
    pub fn not_found(session_id: &str, job_id: &str) -> Self {
        Self::NotFound {
            session_id: session_id.to_string(),
            job_id: job_id.to_string(),
        }
    }

    /// Failures that belong to a single job and end up in its record.
    pub fn is_job_local(&self) -> bool {
        matches!(
            self,
            GravityError::InvalidProblem(_)
                | GravityError::NumericalDivergence(_)
                | GravityError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GravityError>;
