//! Transport-agnostic boundary of the solver.
//!
//! Each `on_*` method corresponds to one inbound client event. A socket or
//! HTTP layer only has to decode frames into the wire types below and forward
//! the calls.

pub mod wire;

use std::sync::Arc;

use crate::archive::TrajectoryArchive;
use crate::config::ServiceConfig;
use crate::error::{GravityError, Result};
use crate::notifier::{BroadcastNotifier, SessionEvents};
use crate::scheduler::{Job, JobPayload, Scheduler};
use crate::store::ResultStore;

pub use wire::{JobRequest, KindTag, Rejection, RetrieveResponse, SubmitReport};

pub struct SolverService {
    scheduler: Arc<Scheduler>,
    notifier: BroadcastNotifier,
}

impl SolverService {
    /// Start a service with its own scheduler and no archive.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Self::start(config, None)
    }

    /// Start a service whose workers persist finished trajectories to
    /// `archive` and fall back to it on postprocess.
    pub fn with_archive(config: ServiceConfig, archive: Arc<dyn TrajectoryArchive>) -> Result<Self> {
        Self::start(config, Some(archive))
    }

    fn start(config: ServiceConfig, archive: Option<Arc<dyn TrajectoryArchive>>) -> Result<Self> {
        let notifier = BroadcastNotifier::new(config.event_buffer);
        let scheduler = Scheduler::start(
            config.scheduler,
            Arc::new(ResultStore::new()),
            Arc::new(notifier.clone()),
            archive,
        )?;
        Ok(Self {
            scheduler: Arc::new(scheduler),
            notifier,
        })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Open a session under a freshly generated id.
    pub async fn connect(&self) -> String {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        self.on_client_connect(&session_id).await;
        session_id
    }

    pub async fn on_client_connect(&self, session_id: &str) {
        self.scheduler.register_client(session_id).await;
    }

    /// Drop the session and everything stored under it. Jobs still in flight
    /// finish but their results are discarded.
    pub async fn on_client_disconnect(&self, session_id: &str) {
        self.scheduler.unregister_client(session_id).await;
    }

    /// Completion events for `session_id`. Subscribe before submitting to
    /// see every event.
    pub fn subscribe(&self, session_id: &str) -> SessionEvents {
        self.notifier.subscribe(session_id)
    }

    /// Validate and submit a batch. Invalid jobs are reported back without
    /// reaching the pool; the rest are queued. Jobs the intake refuses, or
    /// whose session vanished mid-batch, are reported as rejected too.
    pub async fn on_submit(&self, session_id: &str, requests: Vec<JobRequest>) -> Result<SubmitReport> {
        if !self.scheduler.store().is_registered(session_id).await {
            return Err(GravityError::SessionNotFound(session_id.to_string()));
        }

        let mut jobs = Vec::with_capacity(requests.len());
        let mut rejected = Vec::new();
        for request in requests {
            match JobPayload::build(request.kind.id, &request.problem) {
                Ok(payload) => jobs.push(Job::new(session_id, request.id, payload)),
                Err(e) => {
                    tracing::info!(
                        session_id,
                        job_id = %request.id,
                        error = %e,
                        "Rejected invalid job"
                    );
                    rejected.push(Rejection {
                        job_id: request.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let submission = self.scheduler.submit_batch(jobs).await?;
        let vanished = GravityError::SessionNotFound(session_id.to_string()).to_string();
        rejected.extend(submission.skipped.into_iter().map(|job_id| Rejection {
            job_id,
            reason: vanished.clone(),
        }));
        if let Some(refusal) = submission.refusal {
            tracing::warn!(
                session_id,
                refused = submission.refused.len(),
                error = %refusal,
                "Part of the batch was refused"
            );
            let reason = refusal.to_string();
            rejected.extend(submission.refused.into_iter().map(|job_id| Rejection {
                job_id,
                reason: reason.clone(),
            }));
        }

        Ok(SubmitReport {
            accepted: submission.queued,
            rejected,
        })
    }

    pub async fn on_postprocess(&self, session_id: &str, job_ids: Vec<String>) -> Result<usize> {
        self.scheduler.postprocess(session_id, job_ids).await
    }

    /// Look up a stored record. A missing job or session is a negative
    /// response, never an error.
    pub async fn on_retrieve(&self, session_id: &str, job_id: &str) -> RetrieveResponse {
        match self.scheduler.store().get(session_id, job_id).await {
            Ok(record) => RetrieveResponse {
                status: record.succeeded(),
                record: Some(record),
            },
            Err(e) => {
                tracing::debug!(session_id, job_id, error = %e, "Retrieve missed");
                RetrieveResponse {
                    status: false,
                    record: None,
                }
            }
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await
    }
}
