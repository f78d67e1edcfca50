//! Concurrent scheduler for classical N-body gravitation jobs.
//!
//! Clients submit batches of problems per session. A fixed pool of workers
//! integrates each problem on the blocking thread pool, stores the
//! trajectory in a shared result store and publishes a completion event to
//! the owning session.

pub mod archive;
pub mod config;
pub mod error;
pub mod kernel;
pub mod notifier;
pub mod postprocess;
pub mod problem;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use error::{GravityError, Result};
