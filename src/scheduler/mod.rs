//! Job intake, dispatch to the worker pool, and completion delivery.

pub mod completion;
pub mod job;
pub mod manager;
pub mod queue;

pub use completion::Completion;
pub use job::{Job, JobKind, JobPayload, JobStatus};
pub use manager::{Scheduler, Submission};
pub use queue::Dispatch;
