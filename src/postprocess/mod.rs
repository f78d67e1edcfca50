//! Data reduction of finished trajectories for the visualization layer.
//!
//! Rendering lives outside this crate. What it needs from here is a
//! down-sampled copy of the trajectory, the axis ranges to draw it in, and a
//! quick health summary of the run.

use ndarray::{s, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::error::{GravityError, Result};
use crate::kernel::diagnostics::{linear_momentum, max_relative_drift, total_energy};
use crate::kernel::Solution;
use crate::problem::Problem;

/// Per-axis minimum and maximum over every sample and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Bounds {
    fn of(values: &Array3<f64>) -> Self {
        let dimension = values.len_of(Axis(2));
        let mut min = vec![f64::INFINITY; dimension];
        let mut max = vec![f64::NEG_INFINITY; dimension];
        for lane in values.lanes(Axis(2)) {
            for (k, v) in lane.iter().enumerate() {
                min[k] = min[k].min(*v);
                max[k] = max[k].max(*v);
            }
        }
        Self { min, max }
    }
}

/// Drift of conserved quantities across the reduced samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conservation {
    pub initial_energy: f64,
    pub energy_drift: f64,
    pub momentum_drift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryExport {
    pub stride: usize,
    pub trace_len: usize,
    pub times: Vec<f64>,
    pub positions: Array3<f64>,
    pub velocities: Array3<f64>,
    pub position_bounds: Bounds,
    pub velocity_bounds: Bounds,
    /// Present when the problem (masses, `g`) is known.
    pub conservation: Option<Conservation>,
}

impl TrajectoryExport {
    pub fn samples(&self) -> usize {
        self.positions.len_of(Axis(0))
    }
}

/// Reduce a successful solution to every `stride`-th sample.
pub fn export(
    solution: &Solution,
    problem: Option<&Problem>,
    config: &ExportConfig,
) -> Result<TrajectoryExport> {
    if !solution.status || solution.samples() == 0 {
        return Err(GravityError::Internal(
            "cannot export a failed solution".to_string(),
        ));
    }
    let stride = config.stride.max(1);
    let step = stride as isize;

    let positions = solution.positions.slice(s![..;step, .., ..]).to_owned();
    let velocities = solution.velocities.slice(s![..;step, .., ..]).to_owned();
    let times: Vec<f64> = solution.mesh.iter().step_by(stride).copied().collect();

    let conservation = problem.map(|p| conservation(p, &positions, &velocities));

    Ok(TrajectoryExport {
        stride,
        trace_len: config.trace_len,
        times,
        position_bounds: Bounds::of(&positions),
        velocity_bounds: Bounds::of(&velocities),
        positions,
        velocities,
        conservation,
    })
}

fn conservation(problem: &Problem, positions: &Array3<f64>, velocities: &Array3<f64>) -> Conservation {
    let samples = positions.len_of(Axis(0));

    let energies: Vec<f64> = (0..samples)
        .map(|m| {
            total_energy(
                &problem.mass,
                problem.g,
                positions.index_axis(Axis(0), m),
                velocities.index_axis(Axis(0), m),
            )
        })
        .collect();

    let momenta: Vec<Vec<f64>> = (0..samples)
        .map(|m| linear_momentum(&problem.mass, velocities.index_axis(Axis(0), m)))
        .collect();
    let momentum_drift = momenta
        .first()
        .map(|p0| {
            momenta
                .iter()
                .map(|p| {
                    p.iter()
                        .zip(p0)
                        .map(|(a, b)| (a - b).abs())
                        .fold(0.0, f64::max)
                })
                .fold(0.0, f64::max)
        })
        .unwrap_or(0.0);

    Conservation {
        initial_energy: energies.first().copied().unwrap_or(0.0),
        energy_drift: max_relative_drift(&energies),
        momentum_drift,
    }
}
