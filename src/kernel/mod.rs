//! Gravitation kernel: the N-body system function and the adaptive
//! integration that turns a [`Problem`] into a [`Solution`].
//!
//! # Components
//!
//! - [`OdeSystem`]: first-order system `y' = f(t, y)` the integrator drives
//! - [`Gravitation`]: pairwise Newtonian attraction over the packed state
//! - [`integrate`]: `ode_solvers` Dormand–Prince 5(4), one run per mesh interval
//! - [`diagnostics`]: energy and momentum of a sampled state
//!
//! # Failure contract
//!
//! [`solve`] never returns an error. Collisions, step size underflow,
//! excess work, overflow and exhausted time budgets all produce a
//! [`Solution`] with `status == false` and empty arrays, so one bad job
//! cannot take a worker down with it.

pub mod diagnostics;
pub mod integrator;
pub mod solution;
pub mod system;

pub use integrator::integrate;
pub use solution::Solution;
pub use system::{Gravitation, OdeSystem};

use crate::config::IntegratorConfig;
use crate::error::Result;
use crate::problem::Problem;

/// Integrate `problem` over its mesh, propagating numerical errors.
pub fn try_solve(problem: &Problem, config: &IntegratorConfig) -> Result<Solution> {
    let system = Gravitation::new(problem);
    let trajectory = integrate(&system, &problem.initial_state, &problem.mesh, config)?;
    Solution::from_trajectory(problem, trajectory)
}

/// Integrate `problem`, folding any numerical failure into a failed
/// [`Solution`].
pub fn solve(problem: &Problem, config: &IntegratorConfig) -> Solution {
    match try_solve(problem, config) {
        Ok(solution) => solution,
        Err(e) if e.is_job_local() => {
            tracing::warn!(
                order = problem.order,
                dimension = problem.dimension,
                samples = problem.mesh.len(),
                error = %e,
                "Solve failed"
            );
            Solution::failed()
        }
        Err(e) => {
            tracing::error!(error = %e, "Solver produced an inconsistent trajectory");
            Solution::failed()
        }
    }
}
