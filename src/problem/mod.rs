//! Problem construction for classical gravitation jobs.
//!
//! Client payloads arrive in the wire shape used by the browser front end:
//! a list of bodies (`r`, `dr`, `m`) plus a `physics` block holding the
//! gravitational constant and the `[t_start, t_end, samples]` time range.
//! [`Problem::build`] validates them and packs the flat state vector the
//! kernel integrates.

pub mod builder;
pub mod payload;

pub use builder::{linspace, Problem, MAX_BODIES, MAX_SAMPLES};
pub use payload::{BodyPayload, PhysicsPayload, ProblemPayload, TimeRange};
