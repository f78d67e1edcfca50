//! Concurrency-safe result store keyed by session and job id.
//!
//! All operations go through one store-wide mutex. Lock holds are limited to
//! a map lookup plus an insert or a clone, never a solve. If contention ever
//! matters the map can be sharded by session id without changing this API.

pub mod record;

pub use record::{JobRecord, WorkerMeta};

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::{GravityError, Result};
use crate::postprocess::TrajectoryExport;
use crate::scheduler::JobStatus;

type SessionJobs = HashMap<String, JobRecord>;

#[derive(Debug, Default)]
pub struct ResultStore {
    sessions: Mutex<HashMap<String, SessionJobs>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty job map for `session_id`, dropping any jobs a
    /// previous connection under the same id left behind.
    pub async fn register(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .insert(session_id.to_string(), HashMap::new())
            .is_some()
        {
            tracing::debug!(session_id, "Session re-registered, prior jobs cleared");
        } else {
            tracing::debug!(session_id, "Session registered");
        }
    }

    /// Remove a session and all of its records. Returns false if it was unknown.
    pub async fn unregister(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn is_registered(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    /// Insert or overwrite the record for `(session_id, job_id)`.
    /// The session must be registered.
    pub async fn put(&self, session_id: &str, job_id: &str, record: JobRecord) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let jobs = sessions
            .get_mut(session_id)
            .ok_or_else(|| GravityError::SessionNotFound(session_id.to_string()))?;
        jobs.insert(job_id.to_string(), record);
        Ok(())
    }

    /// Overwrite a record that is still present. A record dropped by
    /// unregister or re-register stays gone.
    pub async fn replace(&self, session_id: &str, job_id: &str, record: JobRecord) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions
            .get_mut(session_id)
            .and_then(|jobs| jobs.get_mut(job_id))
            .ok_or_else(|| GravityError::not_found(session_id, job_id))?;
        *slot = record;
        Ok(())
    }

    /// Point read of a record.
    pub async fn get(&self, session_id: &str, job_id: &str) -> Result<JobRecord> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .and_then(|jobs| jobs.get(job_id))
            .cloned()
            .ok_or_else(|| GravityError::not_found(session_id, job_id))
    }

    /// Move an existing record to `status`.
    pub async fn set_status(&self, session_id: &str, job_id: &str, status: JobStatus) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .and_then(|jobs| jobs.get_mut(job_id))
            .ok_or_else(|| GravityError::not_found(session_id, job_id))?;
        record.status = status;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Attach postprocess output and the worker that produced it.
    pub async fn attach_export(
        &self,
        session_id: &str,
        job_id: &str,
        export: TrajectoryExport,
        worker: WorkerMeta,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .and_then(|jobs| jobs.get_mut(job_id))
            .ok_or_else(|| GravityError::not_found(session_id, job_id))?;
        record.export = Some(export);
        record.worker = Some(worker);
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Job ids held for a session, sorted.
    pub async fn jobs(&self, session_id: &str) -> Result<Vec<String>> {
        let sessions = self.sessions.lock().await;
        let jobs = sessions
            .get(session_id)
            .ok_or_else(|| GravityError::SessionNotFound(session_id.to_string()))?;
        let mut ids: Vec<String> = jobs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
