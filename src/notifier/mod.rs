//! Delivery of completion events to the session that owns a job.
//!
//! Delivery is best effort: a notifier never reports failure back to the
//! scheduler, and an event for a session nobody listens to is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::store::WorkerMeta;

/// Named event channel a completion is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// First solve of a job finished.
    Process,
    /// Export of a stored result finished.
    Postprocess,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Process => write!(f, "process"),
            Channel::Postprocess => write!(f, "postprocess"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub channel: Channel,
    pub session_id: String,
    pub job_id: String,
    pub succeeded: bool,
    pub worker: Option<WorkerMeta>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: CompletionEvent);
}

/// Fans events out to any number of subscribers, each filtering for its
/// own session.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<CompletionEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self, session_id: impl Into<String>) -> SessionEvents {
        SessionEvents {
            session_id: session_id.into(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: CompletionEvent) {
        tracing::debug!(
            channel = %event.channel,
            session_id = %event.session_id,
            job_id = %event.job_id,
            succeeded = event.succeeded,
            "Publishing completion"
        );
        // no receivers is not an error
        let _ = self.tx.send(event);
    }
}

/// Completion events for one session.
pub struct SessionEvents {
    session_id: String,
    rx: broadcast::Receiver<CompletionEvent>,
}

impl SessionEvents {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event for this session, or `None` once the notifier is gone.
    /// Events lost to a lagging receiver are skipped with a warning.
    pub async fn recv(&mut self) -> Option<CompletionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.session_id == self.session_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        skipped,
                        "Subscriber lagged, completion events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: CompletionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Completion receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session_id: &str, job_id: &str) -> CompletionEvent {
        CompletionEvent {
            channel: Channel::Process,
            session_id: session_id.to_string(),
            job_id: job_id.to_string(),
            succeeded: true,
            worker: None,
        }
    }

    #[tokio::test]
    async fn session_subscription_filters_other_sessions() {
        let notifier = BroadcastNotifier::new(16);
        let mut events = notifier.subscribe("a");

        notifier.notify(event("b", "1"));
        notifier.notify(event("a", "2"));

        let received = events.recv().await.unwrap();
        assert_eq!(received.job_id, "2");
        assert_eq!(events.session_id(), "a");
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(1);
        notifier.notify(event("a", "1"));
        notifier.notify(event("a", "2"));
    }

    #[tokio::test]
    async fn channel_notifier_forwards_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(event("a", "1"));
        notifier.notify(event("a", "2"));
        assert_eq!(rx.recv().await.unwrap().job_id, "1");
        assert_eq!(rx.recv().await.unwrap().job_id, "2");
    }

    #[test]
    fn channel_names() {
        assert_eq!(Channel::Process.to_string(), "process");
        assert_eq!(
            serde_json::to_string(&Channel::Postprocess).unwrap(),
            "\"postprocess\""
        );
    }
}
