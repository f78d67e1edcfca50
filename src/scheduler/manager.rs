use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::archive::TrajectoryArchive;
use crate::config::SchedulerConfig;
use crate::error::{GravityError, Result};
use crate::notifier::Notifier;
use crate::scheduler::completion::completion_loop;
use crate::scheduler::job::{Job, JobStatus};
use crate::scheduler::queue::{self, Dispatch, IntakeSender};
use crate::store::{JobRecord, ResultStore};
use crate::worker::pool::spawn_workers;
use crate::worker::JobExecutor;

/// Per-job outcome of [`Scheduler::submit_batch`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Submission {
    /// Handed to the pool.
    pub queued: Vec<String>,
    /// Belonging to a session that is not registered.
    pub skipped: Vec<String>,
    /// Refused by the intake, in submission order.
    pub refused: Vec<String>,
    /// Why the intake refused, set whenever `refused` is not empty.
    pub refusal: Option<GravityError>,
}

/// Owns the worker pool, the result store and completion delivery.
///
/// All pool tasks are spawned on the current tokio runtime when the
/// scheduler is started. Completions are handled by a single task, so the
/// events a session sees follow completion order.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<ResultStore>,
    intake: Mutex<Option<IntakeSender>>,
    handles: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Scheduler {
    /// Start a scheduler with a fresh result store and no archive.
    pub fn new(config: SchedulerConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::start(config, Arc::new(ResultStore::new()), notifier, None)
    }

    /// Start the worker pool and the completion handler.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot form a pool or no tokio runtime is
    /// running.
    pub fn start(
        config: SchedulerConfig,
        store: Arc<ResultStore>,
        notifier: Arc<dyn Notifier>,
        archive: Option<Arc<dyn TrajectoryArchive>>,
    ) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(GravityError::Internal(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        if config.queue_capacity == Some(0) {
            return Err(GravityError::Internal(
                "bounded intake needs a capacity of at least one".to_string(),
            ));
        }
        tokio::runtime::Handle::try_current()
            .map_err(|e| GravityError::Internal(format!("no tokio runtime: {}", e)))?;

        let (intake_tx, intake_rx) = queue::intake(config.queue_capacity, config.queue_policy);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let executors = (1..=config.pool_size)
            .map(|worker_id| JobExecutor::new(worker_id, &config, store.clone(), archive.clone()))
            .collect();
        let mut handles = spawn_workers(executors, intake_rx, completion_tx);
        handles.push(tokio::spawn(completion_loop(
            completion_rx,
            store.clone(),
            notifier,
        )));

        tracing::info!(
            pool_size = config.pool_size,
            queue_capacity = ?config.queue_capacity,
            queue_policy = ?config.queue_policy,
            archive = archive.is_some(),
            "Scheduler started"
        );

        Ok(Self {
            config,
            store,
            intake: Mutex::new(Some(intake_tx)),
            handles: Mutex::new(Some(handles)),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Register a client session, clearing any jobs a previous connection
    /// under the same id left behind.
    pub async fn register_client(&self, session_id: &str) {
        self.store.register(session_id).await;
        tracing::info!(session_id, "Client registered");
    }

    pub async fn unregister_client(&self, session_id: &str) -> bool {
        let removed = self.store.unregister(session_id).await;
        if removed {
            tracing::info!(session_id, "Client unregistered");
        }
        removed
    }

    /// Queue jobs for solving. Returns how many were dispatched.
    ///
    /// # Errors
    ///
    /// `ShuttingDown` once `shutdown` has begun, `ResourceExhausted` when a
    /// rejecting bounded intake is full. Jobs before the failing one stay
    /// queued; see [`Scheduler::submit_batch`] for the per-job outcome.
    pub async fn submit(&self, jobs: Vec<Job>) -> Result<usize> {
        let submission = self.submit_batch(jobs).await?;
        match submission.refusal {
            Some(e) => Err(e),
            None => Ok(submission.queued.len()),
        }
    }

    /// Queue jobs for solving and report what happened to each one.
    ///
    /// Each accepted job gets a pending record first, overwriting any prior
    /// record with the same id. Jobs of unregistered sessions are skipped.
    /// When the intake refuses a job, that job is marked failed and it and
    /// every later job of the batch are returned as refused.
    ///
    /// # Errors
    ///
    /// `ShuttingDown` when intake is already closed.
    pub async fn submit_batch(&self, jobs: Vec<Job>) -> Result<Submission> {
        let sender = self.sender().await?;
        let mut submission = Submission::default();
        let mut jobs = jobs.into_iter();

        while let Some(job) = jobs.next() {
            let (session_id, job_id) = (job.session_id.clone(), job.job_id.clone());

            if let Err(e) = self
                .store
                .put(&session_id, &job_id, JobRecord::pending(&job))
                .await
            {
                tracing::warn!(
                    session_id = %session_id,
                    job_id = %job_id,
                    error = %e,
                    "Job submitted for unknown session, skipped"
                );
                submission.skipped.push(job_id);
                continue;
            }

            if let Err(e) = sender.send(Dispatch::Process(job)).await {
                let _ = self
                    .store
                    .set_status(&session_id, &job_id, JobStatus::Failed)
                    .await;
                tracing::warn!(
                    session_id = %session_id,
                    job_id = %job_id,
                    remaining = jobs.len(),
                    error = %e,
                    "Job could not be queued"
                );
                submission.refused.push(job_id);
                submission.refused.extend(jobs.map(|job| job.job_id));
                submission.refusal = Some(e);
                break;
            }

            tracing::debug!(session_id = %session_id, job_id = %job_id, "Job queued");
            submission.queued.push(job_id);
        }

        Ok(submission)
    }

    /// Queue export of stored results for `job_ids` of one session.
    pub async fn postprocess(&self, session_id: &str, job_ids: Vec<String>) -> Result<usize> {
        let sender = self.sender().await?;
        let mut dispatched = 0;
        for job_id in job_ids {
            sender
                .send(Dispatch::Postprocess {
                    session_id: session_id.to_string(),
                    job_id,
                })
                .await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// True until `shutdown` has been called.
    pub async fn is_accepting(&self) -> bool {
        self.intake.lock().await.is_some()
    }

    /// Stop intake, let workers drain everything already queued, then wait
    /// for the pool and the completion handler to exit.
    ///
    /// Idempotent. Concurrent callers all return once the pool is gone.
    pub async fn shutdown(&self) -> Result<()> {
        if self.intake.lock().await.take().is_some() {
            tracing::info!("Scheduler shutting down, draining queued jobs");
        }

        let mut handles = self.handles.lock().await;
        let Some(handles) = handles.take() else {
            return Ok(());
        };

        let mut failed = 0usize;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Pool task ended abnormally");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(GravityError::Internal(format!(
                "{} pool task(s) ended abnormally",
                failed
            )));
        }
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Shut down when `token` is cancelled, e.g. by a signal handler.
    pub fn shutdown_on(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            if let Err(e) = scheduler.shutdown().await {
                tracing::error!(error = %e, "Shutdown failed");
            }
        })
    }

    async fn sender(&self) -> Result<IntakeSender> {
        self.intake
            .lock()
            .await
            .clone()
            .ok_or(GravityError::ShuttingDown)
    }
}
