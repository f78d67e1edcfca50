//! Solver workers.
//!
//! A fixed number of workers share one intake queue. Each worker:
//!
//! 1. Takes the next [`Dispatch`](crate::scheduler::Dispatch)
//! 2. Marks the job running and solves it on the blocking thread pool
//! 3. Writes the record into the result store
//! 4. Hands a [`Completion`](crate::scheduler::Completion) to the scheduler
//!
//! Workers keep no state between jobs apart from the shared result store.

pub mod executor;
pub(crate) mod pool;

pub use executor::JobExecutor;
