use std::sync::Arc;
use std::time::Instant;

use crate::archive::{ArchivedTrajectory, TrajectoryArchive};
use crate::config::{ExportConfig, IntegratorConfig, SchedulerConfig};
use crate::kernel::{self, Solution};
use crate::notifier::Channel;
use crate::postprocess;
use crate::scheduler::completion::Completion;
use crate::scheduler::queue::Dispatch;
use crate::scheduler::{Job, JobKind, JobPayload, JobStatus};
use crate::store::{JobRecord, ResultStore, WorkerMeta};

/// Runs dispatches on behalf of one pool worker.
///
/// Every failure inside a job ends up in that job's record or in a skipped
/// notification; `execute` itself never fails.
#[derive(Clone)]
pub struct JobExecutor {
    worker_id: usize,
    integrator: IntegratorConfig,
    export: ExportConfig,
    store: Arc<ResultStore>,
    archive: Option<Arc<dyn TrajectoryArchive>>,
}

impl JobExecutor {
    pub fn new(
        worker_id: usize,
        config: &SchedulerConfig,
        store: Arc<ResultStore>,
        archive: Option<Arc<dyn TrajectoryArchive>>,
    ) -> Self {
        Self {
            worker_id,
            integrator: config.integrator.clone(),
            export: config.export.clone(),
            store,
            archive,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Execute one dispatch. Returns the completion to publish, or `None`
    /// when there is nothing to notify (session gone, nothing stored).
    pub async fn execute(&self, dispatch: Dispatch) -> Option<Completion> {
        match dispatch {
            Dispatch::Process(job) => self.process(job).await,
            Dispatch::Postprocess { session_id, job_id } => {
                self.postprocess(session_id, job_id).await
            }
        }
    }

    async fn process(&self, job: Job) -> Option<Completion> {
        let session_id = job.session_id.clone();
        let job_id = job.job_id.clone();

        if let Err(e) = self
            .store
            .set_status(&session_id, &job_id, JobStatus::Running)
            .await
        {
            tracing::warn!(
                worker_id = self.worker_id,
                session_id = %session_id,
                job_id = %job_id,
                error = %e,
                "Job record vanished before start, skipping"
            );
            return None;
        }

        tracing::info!(
            worker_id = self.worker_id,
            session_id = %session_id,
            job_id = %job_id,
            kind = %job.kind(),
            "Solving job"
        );

        let started = Instant::now();
        let payload = job.payload.clone();
        let integrator = self.integrator.clone();
        let solution = match tokio::task::spawn_blocking(move || run_payload(&payload, &integrator))
            .await
        {
            Ok(solution) => solution,
            Err(e) => {
                tracing::error!(
                    worker_id = self.worker_id,
                    job_id = %job_id,
                    error = %e,
                    "Solver task aborted"
                );
                Solution::failed()
            }
        };
        let meta = WorkerMeta::new(self.worker_id, started.elapsed());

        if solution.status {
            if let Some(archive) = &self.archive {
                archive.save(ArchivedTrajectory::from_solution(&job_id, &solution));
            }
        }

        let record = JobRecord::completed(&job, solution, meta);
        tracing::info!(
            worker_id = self.worker_id,
            session_id = %session_id,
            job_id = %job_id,
            status = %record.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job finished"
        );

        if let Err(e) = self.store.replace(&session_id, &job_id, record).await {
            tracing::warn!(
                session_id = %session_id,
                job_id = %job_id,
                error = %e,
                "Job record dropped before result was stored"
            );
            return None;
        }

        Some(Completion {
            channel: Channel::Process,
            session_id,
            job_id,
        })
    }

    async fn postprocess(&self, session_id: String, job_id: String) -> Option<Completion> {
        let started = Instant::now();

        let record = match self.store.get(&session_id, &job_id).await {
            Ok(record) if record.succeeded() => record,
            Ok(record) => {
                tracing::debug!(
                    session_id = %session_id,
                    job_id = %job_id,
                    status = %record.status,
                    "No successful solution to postprocess"
                );
                return None;
            }
            Err(_) => self.restore(&session_id, &job_id).await?,
        };

        let config = self.export.clone();
        let exported = tokio::task::spawn_blocking(move || {
            postprocess::export(&record.solution, record.problem.as_ref(), &config)
        })
        .await;

        let export = match exported {
            Ok(Ok(export)) => export,
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job_id, error = %e, "Export failed");
                return None;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Export task aborted");
                return None;
            }
        };

        let meta = WorkerMeta::new(self.worker_id, started.elapsed());
        if let Err(e) = self
            .store
            .attach_export(&session_id, &job_id, export, meta)
            .await
        {
            tracing::warn!(job_id = %job_id, error = %e, "Record gone before export was stored");
            return None;
        }

        Some(Completion {
            channel: Channel::Postprocess,
            session_id,
            job_id,
        })
    }

    /// Rebuild a record from the archive when the store has none.
    async fn restore(&self, session_id: &str, job_id: &str) -> Option<JobRecord> {
        let row = self.archive.as_ref()?.load(job_id)?;
        let record = JobRecord::restored(job_id, JobKind::ClassicalGravitation, row.into_solution());

        match self.store.put(session_id, job_id, record.clone()).await {
            Ok(()) => {
                tracing::debug!(session_id, job_id, "Restored result from archive");
                Some(record)
            }
            Err(e) => {
                tracing::debug!(session_id, job_id, error = %e, "Cannot restore into unknown session");
                None
            }
        }
    }
}

fn run_payload(payload: &JobPayload, integrator: &IntegratorConfig) -> Solution {
    match payload {
        JobPayload::ClassicalGravitation(problem) => kernel::solve(problem, integrator),
    }
}
