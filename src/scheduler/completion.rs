use std::sync::Arc;

use tokio::sync::mpsc;

use crate::notifier::{Channel, CompletionEvent, Notifier};
use crate::store::ResultStore;

/// Message a worker sends after it has written its record. Carries only the
/// identity of the job; the handler reads the record back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub channel: Channel,
    pub session_id: String,
    pub job_id: String,
}

/// Turn completions into notifier events, one at a time, in arrival order.
///
/// Exits when every worker has dropped its sender.
pub(crate) async fn completion_loop(
    mut rx: mpsc::UnboundedReceiver<Completion>,
    store: Arc<ResultStore>,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(completion) = rx.recv().await {
        handle_completion(completion, &store, notifier.as_ref()).await;
    }
    tracing::debug!("Completion handler stopped");
}

async fn handle_completion(completion: Completion, store: &ResultStore, notifier: &dyn Notifier) {
    let Completion {
        channel,
        session_id,
        job_id,
    } = completion;

    let record = match store.get(&session_id, &job_id).await {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(
                channel = %channel,
                session_id = %session_id,
                job_id = %job_id,
                error = %e,
                "Record gone before notification, skipping"
            );
            return;
        }
    };

    notifier.notify(CompletionEvent {
        channel,
        succeeded: record.succeeded(),
        worker: record.worker,
        session_id,
        job_id,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Solution;
    use crate::notifier::ChannelNotifier;
    use crate::problem::{BodyPayload, Problem, ProblemPayload, TimeRange};
    use crate::scheduler::Job;
    use crate::store::{JobRecord, WorkerMeta};
    use std::time::Duration;

    fn record(job_id: &str) -> JobRecord {
        let problem = Problem::build(&ProblemPayload::new(
            vec![BodyPayload::at_rest(vec![0.0, 0.0], 1.0)],
            1.0,
            TimeRange(0.0, 1.0, 2),
        ))
        .unwrap();
        JobRecord::completed(
            &Job::classical_gravitation("s1", job_id, problem),
            Solution::failed(),
            WorkerMeta::new(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn publishes_record_worker_meta() {
        let store = Arc::new(ResultStore::new());
        store.register("s1").await;
        store.put("s1", "j1", record("j1")).await.unwrap();

        let (notifier, mut events) = ChannelNotifier::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(completion_loop(rx, store, Arc::new(notifier)));

        tx.send(Completion {
            channel: Channel::Process,
            session_id: "s1".to_string(),
            job_id: "j1".to_string(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.job_id, "j1");
        assert!(!event.succeeded);
        assert_eq!(event.worker.unwrap().worker_id, 3);
    }

    #[tokio::test]
    async fn missing_record_skips_notification() {
        let store = Arc::new(ResultStore::new());
        let (notifier, mut events) = ChannelNotifier::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(completion_loop(rx, store, Arc::new(notifier)));

        tx.send(Completion {
            channel: Channel::Postprocess,
            session_id: "gone".to_string(),
            job_id: "j1".to_string(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(events.recv().await.is_none());
    }
}
