use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::scheduler::completion::Completion;
use crate::scheduler::queue::IntakeReceiver;
use crate::worker::JobExecutor;

/// Spawn one task per executor, all pulling from the same intake.
pub(crate) fn spawn_workers(
    executors: Vec<JobExecutor>,
    intake: IntakeReceiver,
    completions: mpsc::UnboundedSender<Completion>,
) -> Vec<JoinHandle<()>> {
    let intake = Arc::new(Mutex::new(intake));
    executors
        .into_iter()
        .map(|executor| {
            let intake = intake.clone();
            let completions = completions.clone();
            tokio::spawn(worker_loop(executor, intake, completions))
        })
        .collect()
}

/// Take dispatches until the intake is closed and drained.
async fn worker_loop(
    executor: JobExecutor,
    intake: Arc<Mutex<IntakeReceiver>>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    tracing::debug!(worker_id = executor.worker_id(), "Worker started");

    loop {
        let next = intake.lock().await.recv().await;
        let Some(dispatch) = next else {
            break;
        };
        tracing::debug!(
            worker_id = executor.worker_id(),
            session_id = dispatch.session_id(),
            job_id = dispatch.job_id(),
            channel = %dispatch.channel(),
            "Dispatch taken"
        );

        if let Some(completion) = executor.execute(dispatch).await {
            if completions.send(completion).is_err() {
                tracing::warn!(
                    worker_id = executor.worker_id(),
                    "Completion handler gone, dropping notification"
                );
            }
        }
    }

    tracing::debug!(worker_id = executor.worker_id(), "Worker stopped");
}
