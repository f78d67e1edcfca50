use tokio::sync::mpsc;

use crate::config::QueuePolicy;
use crate::error::{GravityError, Result};
use crate::notifier::Channel;
use crate::scheduler::job::Job;

/// Unit of work handed to the pool.
#[derive(Debug)]
pub enum Dispatch {
    /// Solve a job for the first time.
    Process(Job),
    /// Export the stored result of an already solved job.
    Postprocess { session_id: String, job_id: String },
}

impl Dispatch {
    pub fn session_id(&self) -> &str {
        match self {
            Dispatch::Process(job) => &job.session_id,
            Dispatch::Postprocess { session_id, .. } => session_id,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Dispatch::Process(job) => &job.job_id,
            Dispatch::Postprocess { job_id, .. } => job_id,
        }
    }

    /// Channel the completion of this dispatch is published on.
    pub fn channel(&self) -> Channel {
        match self {
            Dispatch::Process(_) => Channel::Process,
            Dispatch::Postprocess { .. } => Channel::Postprocess,
        }
    }
}

/// Sending half of the pool intake.
#[derive(Debug, Clone)]
pub enum IntakeSender {
    Bounded(mpsc::Sender<Dispatch>, QueuePolicy),
    Unbounded(mpsc::UnboundedSender<Dispatch>),
}

/// Receiving half of the pool intake, shared by all workers.
#[derive(Debug)]
pub enum IntakeReceiver {
    Bounded(mpsc::Receiver<Dispatch>),
    Unbounded(mpsc::UnboundedReceiver<Dispatch>),
}

/// Create the intake queue. `capacity` of `None` means unbounded.
pub fn intake(capacity: Option<usize>, policy: QueuePolicy) -> (IntakeSender, IntakeReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                IntakeSender::Bounded(tx, policy),
                IntakeReceiver::Bounded(rx),
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (IntakeSender::Unbounded(tx), IntakeReceiver::Unbounded(rx))
        }
    }
}

impl IntakeSender {
    /// Enqueue a dispatch.
    ///
    /// Only a bounded intake can wait (`Block`) or fail with
    /// `ResourceExhausted` (`Reject`). A closed intake means the pool is
    /// shutting down.
    pub async fn send(&self, dispatch: Dispatch) -> Result<()> {
        match self {
            IntakeSender::Unbounded(tx) => {
                tx.send(dispatch).map_err(|_| GravityError::ShuttingDown)
            }
            IntakeSender::Bounded(tx, QueuePolicy::Block) => {
                tx.send(dispatch).await.map_err(|_| GravityError::ShuttingDown)
            }
            IntakeSender::Bounded(tx, QueuePolicy::Reject) => {
                tx.try_send(dispatch).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => GravityError::ResourceExhausted,
                    mpsc::error::TrySendError::Closed(_) => GravityError::ShuttingDown,
                })
            }
        }
    }
}

impl IntakeReceiver {
    /// Next dispatch, or `None` once every sender is gone and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<Dispatch> {
        match self {
            IntakeReceiver::Bounded(rx) => rx.recv().await,
            IntakeReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postprocess(job_id: &str) -> Dispatch {
        Dispatch::Postprocess {
            session_id: "s".to_string(),
            job_id: job_id.to_string(),
        }
    }

    #[tokio::test]
    async fn unbounded_intake_accepts_everything() {
        let (tx, mut rx) = intake(None, QueuePolicy::Reject);
        for i in 0..1000 {
            tx.send(postprocess(&i.to_string())).await.unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().job_id(), "0");
    }

    #[tokio::test]
    async fn bounded_reject_reports_exhaustion() {
        let (tx, _rx) = intake(Some(2), QueuePolicy::Reject);
        tx.send(postprocess("a")).await.unwrap();
        tx.send(postprocess("b")).await.unwrap();
        assert_eq!(
            tx.send(postprocess("c")).await,
            Err(GravityError::ResourceExhausted)
        );
    }

    #[tokio::test]
    async fn bounded_block_waits_for_room() {
        let (tx, mut rx) = intake(Some(1), QueuePolicy::Block);
        tx.send(postprocess("a")).await.unwrap();

        let sender = tx.clone();
        let blocked = tokio::spawn(async move { sender.send(postprocess("b")).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        assert_eq!(rx.recv().await.unwrap().job_id(), "a");
        blocked.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().job_id(), "b");
    }

    #[tokio::test]
    async fn closed_intake_is_shutting_down() {
        let (tx, rx) = intake(None, QueuePolicy::Block);
        drop(rx);
        assert_eq!(
            tx.send(postprocess("a")).await,
            Err(GravityError::ShuttingDown)
        );
    }

    #[tokio::test]
    async fn receiver_drains_after_senders_drop() {
        let (tx, mut rx) = intake(Some(4), QueuePolicy::Block);
        tx.send(postprocess("a")).await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dispatch_channel() {
        let d = postprocess("x");
        assert_eq!(d.channel(), Channel::Postprocess);
        assert_eq!(d.session_id(), "s");
    }
}
